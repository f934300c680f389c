//! Wire formats for the downstream contract and each upstream provider

pub mod anthropic;
pub mod cohere;
pub mod openai;
