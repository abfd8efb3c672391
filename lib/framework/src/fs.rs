pub mod path_buf;
