pub mod stream_printer;
