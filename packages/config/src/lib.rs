// ABOUTME: Configuration package for Unison
// ABOUTME: Centralizes environment variable names shared by every Unison crate

pub mod constants;
