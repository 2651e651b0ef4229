mod common;
mod facts;
mod scoring;
