//! Test suites for the shell bootstrap.

mod lib_api;
mod support;
