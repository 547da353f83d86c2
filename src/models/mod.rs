// src/models/mod.rs

pub mod candidate;
pub mod exam_attempt;
pub mod exam_config;
pub mod question;
