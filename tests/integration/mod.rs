//! Integration tests for pool_httpd
//!
//! Each test starts its own server in-process on an ephemeral port with a
//! temporary document root and talks raw HTTP/1.1 over `TcpStream`.
//!
//! Run with: cargo test --test integration

mod helpers;

mod builtin_pages;
mod keep_alive;
mod static_files;
mod thread_pool;
