//! Integration tests for Sumi-Mirror

mod crawl_tests;
mod link_fixer_tests;
