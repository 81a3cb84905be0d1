/*!
Assertions over the Prometheus text format

`Exposition::parse` turns a scrape body into samples that tests can query
by metric name and label subset.
*/

use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSample {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub value: f64,
}

impl ParsedSample {
    fn matches(&self, name: &str, labels: &[(&str, &str)]) -> bool {
        self.name == name
            && labels
                .iter()
                .all(|(k, v)| self.labels.get(*k).map(String::as_str) == Some(*v))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Exposition {
    pub samples: Vec<ParsedSample>,
}

impl Exposition {
    pub fn parse(text: &str) -> Result<Self> {
        let mut samples = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let sample = parse_line(line)
                .with_context(|| format!("line {}: {}", lineno + 1, line))?;
            samples.push(sample);
        }
        Ok(Self { samples })
    }

    /// Value of the single sample matching `name` and every given label.
    pub fn value(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        let mut found = self.samples.iter().filter(|s| s.matches(name, labels));
        let first = found.next()?;
        if found.next().is_some() {
            log::warn!("several samples match {} {:?}", name, labels);
            return None;
        }
        Some(first.value)
    }

    pub fn all(&self, name: &str, labels: &[(&str, &str)]) -> Vec<&ParsedSample> {
        self.samples.iter().filter(|s| s.matches(name, labels)).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.samples.iter().filter(|s| s.name == name).count()
    }

    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.samples.iter().any(|s| s.name.starts_with(prefix))
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.samples.iter().filter(|s| s.name.starts_with(prefix)).count()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

fn parse_line(line: &str) -> Result<ParsedSample> {
    let (name, rest) = match line.find(|c: char| c == '{' || c == ' ') {
        Some(i) => line.split_at(i),
        None => bail!("missing value"),
    };

    let (labels, rest) = if let Some(body) = rest.strip_prefix('{') {
        parse_labels(body)?
    } else {
        (BTreeMap::new(), rest)
    };

    let value_str = rest
        .split_whitespace()
        .next()
        .context("missing value")?;
    let value = match value_str {
        "+Inf" => f64::INFINITY,
        "-Inf" => f64::NEG_INFINITY,
        "NaN" => f64::NAN,
        v => v.parse::<f64>().with_context(|| format!("bad value {v:?}"))?,
    };

    Ok(ParsedSample {
        name: name.to_string(),
        labels,
        value,
    })
}

/// Parse `k="v",k2="v2"}` and return the labels plus what follows `}`.
fn parse_labels(body: &str) -> Result<(BTreeMap<String, String>, &str)> {
    let mut labels = BTreeMap::new();
    let mut chars = body.char_indices().peekable();

    loop {
        while matches!(chars.peek(), Some((_, ',')) | Some((_, ' '))) {
            chars.next();
        }
        let Some(&(start, c)) = chars.peek() else {
            bail!("unterminated label set");
        };
        if c == '}' {
            return Ok((labels, &body[start + 1..]));
        }

        let mut key = String::new();
        for (_, c) in chars.by_ref() {
            if c == '=' {
                break;
            }
            key.push(c);
        }
        match chars.next() {
            Some((_, '"')) => {}
            _ => bail!("label {key} has no quoted value"),
        }

        let mut value = String::new();
        let mut closed = false;
        while let Some((_, c)) = chars.next() {
            match c {
                '"' => {
                    closed = true;
                    break;
                }
                '\\' => match chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, other)) => value.push(other),
                    None => bail!("dangling escape in label {key}"),
                },
                other => value.push(other),
            }
        }
        if !closed {
            bail!("unterminated value for label {key}");
        }
        labels.insert(key.trim().to_string(), value);
    }
}
