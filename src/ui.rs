// src/ui.rs

//! User-facing output channels
//!
//! Three channels, distinguished by ANSI color: red `error:`, yellow
//! `warning:`, green `info:`/`success:`. Under `--parse` human prose is
//! suppressed so stdout carries only pipe-delimited records; errors and
//! warnings stay on stderr either way.

use std::sync::atomic::{AtomicBool, Ordering};

static PARSE_OUTPUT: AtomicBool = AtomicBool::new(false);

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const GREEN: &str = "\x1b[32m";
const RESET: &str = "\x1b[0m";

/// Switch to machine-readable output for the rest of the process.
pub fn set_parse_output(enabled: bool) {
    PARSE_OUTPUT.store(enabled, Ordering::Relaxed);
}

/// Whether `--parse` was requested.
pub fn parse_output() -> bool {
    PARSE_OUTPUT.load(Ordering::Relaxed)
}

pub fn error(msg: impl AsRef<str>) {
    eprintln!("{}error:{} {}", RED, RESET, msg.as_ref());
}

pub fn warning(msg: impl AsRef<str>) {
    eprintln!("{}warning:{} {}", YELLOW, RESET, msg.as_ref());
}

pub fn info(msg: impl AsRef<str>) {
    if !parse_output() {
        println!("{}info:{} {}", GREEN, RESET, msg.as_ref());
    }
}

pub fn success(msg: impl AsRef<str>) {
    if !parse_output() {
        println!("{}success:{} {}", GREEN, RESET, msg.as_ref());
    }
}
