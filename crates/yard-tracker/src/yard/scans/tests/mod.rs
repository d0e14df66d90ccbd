mod attribution;
mod common;
