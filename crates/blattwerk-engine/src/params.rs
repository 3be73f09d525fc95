// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operation parameters — declared schemas and the validated values handed
// to handlers.

use std::collections::BTreeMap;
use std::fmt;

use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_core::human_errors::printable;

/// The value domain of a declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Integer degrees, a multiple of 90 (negative values allowed).
    Angle,
    /// Non-empty secret string.
    Password,
}

/// One declared parameter of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
}

impl ParamSpec {
    pub const fn angle(name: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Angle,
        }
    }

    pub const fn password(name: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Password,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
enum ParamValue {
    Angle(i32),
    Password(String),
}

/// Parameters that passed validation against an operation's schema.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ResolvedParams {
    values: BTreeMap<&'static str, ParamValue>,
}

impl ResolvedParams {
    /// Check `raw` against `specs`.
    ///
    /// Missing, unknown, or unparseable parameters are validation errors.
    /// An angle that parses but is not a multiple of 90 is an
    /// `UnsupportedArgument`, still raised here before any allocation.
    pub fn resolve(specs: &[ParamSpec], raw: &BTreeMap<String, String>) -> Result<Self> {
        if let Some(unknown) = raw
            .keys()
            .find(|key| !specs.iter().any(|spec| spec.name == key.as_str()))
        {
            return Err(BlattwerkError::validation(format!(
                "unknown parameter '{}'",
                printable(unknown)
            )));
        }

        let mut values = BTreeMap::new();
        for spec in specs {
            let Some(text) = raw.get(spec.name) else {
                return Err(BlattwerkError::validation(format!(
                    "missing parameter '{}'",
                    spec.name
                )));
            };
            let value = match spec.kind {
                ParamKind::Angle => ParamValue::Angle(parse_angle(spec.name, text)?),
                ParamKind::Password => {
                    if text.is_empty() {
                        return Err(BlattwerkError::validation(format!(
                            "parameter '{}' must not be empty",
                            spec.name
                        )));
                    }
                    ParamValue::Password(text.clone())
                }
            };
            values.insert(spec.name, value);
        }
        Ok(Self { values })
    }

    /// The validated angle named `name`.
    pub fn angle(&self, name: &str) -> Result<i32> {
        match self.values.get(name) {
            Some(ParamValue::Angle(degrees)) => Ok(*degrees),
            _ => Err(BlattwerkError::validation(format!(
                "angle parameter '{name}' was not declared"
            ))),
        }
    }

    /// The validated password named `name`.
    pub fn password(&self, name: &str) -> Result<&str> {
        match self.values.get(name) {
            Some(ParamValue::Password(secret)) => Ok(secret),
            _ => Err(BlattwerkError::validation(format!(
                "password parameter '{name}' was not declared"
            ))),
        }
    }
}

// Passwords must never reach the logs.
impl fmt::Debug for ResolvedParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in &self.values {
            match value {
                ParamValue::Angle(degrees) => map.entry(name, degrees),
                ParamValue::Password(_) => map.entry(name, &"<redacted>"),
            };
        }
        map.finish()
    }
}

fn parse_angle(name: &str, text: &str) -> Result<i32> {
    let degrees: i32 = text.trim().parse().map_err(|_| {
        BlattwerkError::validation(format!(
            "parameter '{name}' must be an integer, got '{}'",
            printable(text)
        ))
    })?;
    if degrees % 90 != 0 {
        return Err(BlattwerkError::unsupported_argument(format!(
            "rotation must be a multiple of 90 degrees, got {degrees}"
        )));
    }
    Ok(degrees)
}
