//! Core markup primitives
//!
//! This module contains the fundamental building blocks shared by the
//! readers and the serializer:
//! - Scanner: SIMD-accelerated delimiter detection using memchr
//! - Tokenizer: pull tokenizer with strict (XML) and lenient (HTML) modes
//! - Entities: entity decoding with Cow (zero-copy when possible) and output escaping
//! - Attributes: the ordered attribute map and raw attribute parsing
//! - Namespaces: scoped `xmlns` prefix resolution

pub mod attributes;
pub mod entities;
pub mod namespaces;
pub mod scanner;
pub mod tokenizer;
