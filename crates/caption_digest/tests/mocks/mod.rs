#![allow(dead_code)]

pub mod caption_provider;
pub mod summarizer;
