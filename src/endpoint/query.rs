// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::collections::HashMap;

use crate::errors::{HoraceError, Result};

fn percent_decode(encoded: &str) -> String {
    let mut decoded = String::with_capacity(encoded.len());
    let bytes = encoded.as_bytes();
    let mut index = 0;
    while index < bytes.len() {
        let c = bytes[index] as char;
        if c == '%'
            && index + 3 <= bytes.len()
            && bytes[index + 1].is_ascii_hexdigit()
            && bytes[index + 2].is_ascii_hexdigit()
        {
            let hex = &encoded[index + 1..index + 3];
            if let Ok(v) = u8::from_str_radix(hex, 16) {
                decoded.push(v as char);
                index += 3;
                continue;
            }
        }
        decoded.push(c);
        index += 1;
    }
    decoded
}

/// Configuration options carried in an endpoint URI's query component.
///
/// Parameters are `k=v` pairs separated by `&`; `+` decodes to a space
/// and `%xx` sequences are percent-decoded. A parameter given without a
/// value decodes to the empty string.
#[derive(Debug, Clone, Default)]
pub struct QueryString {
    parameters: HashMap<String, String>,
}

impl QueryString {
    pub fn parse(query: &str) -> Self {
        let mut parameters = HashMap::new();
        for param in query.split('&') {
            if param.is_empty() {
                continue;
            }
            let (name, value) = match param.split_once('=') {
                Some((n, v)) => (n, v),
                None => (param, ""),
            };
            let name = percent_decode(&name.replace('+', " "));
            let value = percent_decode(&value.replace('+', " "));
            parameters.insert(name, value);
        }
        Self { parameters }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    pub fn get_u64(&self, name: &str) -> Result<Option<u64>> {
        match self.parameters.get(name) {
            None => Ok(None),
            Some(v) => v.parse::<u64>().map(Some).map_err(|_| {
                HoraceError::fatal(format!("invalid value for parameter {name}: {v}"))
            }),
        }
    }

    pub fn get_bool(&self, name: &str) -> Result<Option<bool>> {
        match self.parameters.get(name).map(String::as_str) {
            None => Ok(None),
            // A bare parameter counts as enabled.
            Some("") | Some("1") | Some("true") | Some("yes") => Ok(Some(true)),
            Some("0") | Some("false") | Some("no") => Ok(Some(false)),
            Some(v) => Err(HoraceError::fatal(format!(
                "invalid value for parameter {name}: {v}"
            ))),
        }
    }
}
