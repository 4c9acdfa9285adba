use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, HeaderValue},
    response::IntoResponse,
};
use parking_lot::RwLock;

pub const PLAYER_COUNT: &str = "mcping_playercount";
pub const PING_DELAY: &str = "mcping_pingdelay";

const DESCRIPTIONS: [(&str, &str); 2] = [
    (PLAYER_COUNT, "Number of connected players"),
    (PING_DELAY, "Round-trip delay of the status ping in seconds"),
];

/// Destination for gauge values. Implementations must tolerate concurrent
/// writers and readers.
pub trait GaugeSink: Send + Sync {
    fn set(&self, name: &str, labels: &[(&str, &str)], value: f64);
}

type Labels = Vec<(String, String)>;

/// In-memory gauge storage rendered in the Prometheus text format.
#[derive(Default)]
pub struct Registry {
    series: RwLock<BTreeMap<String, BTreeMap<Labels, f64>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn get(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        let labels = owned_labels(labels);
        self.series.read().get(name)?.get(&labels).copied()
    }

    /// Render every series in text exposition format 0.0.4.
    pub fn render(&self) -> String {
        let series = self.series.read();
        let mut out = String::new();
        for (name, values) in series.iter() {
            if let Some((_, help)) = DESCRIPTIONS.iter().find(|(known, _)| *known == name.as_str()) {
                out.push_str(&format!("# HELP {name} {help}\n"));
            }
            out.push_str(&format!("# TYPE {name} gauge\n"));
            for (labels, value) in values {
                out.push_str(name);
                if !labels.is_empty() {
                    out.push('{');
                    for (position, (key, label)) in labels.iter().enumerate() {
                        if position > 0 {
                            out.push(',');
                        }
                        out.push_str(&format!("{key}=\"{}\"", escape_label(label)));
                    }
                    out.push('}');
                }
                out.push_str(&format!(" {value}\n"));
            }
        }
        out
    }
}

impl GaugeSink for Registry {
    fn set(&self, name: &str, labels: &[(&str, &str)], value: f64) {
        let labels = owned_labels(labels);
        self.series
            .write()
            .entry(name.to_owned())
            .or_default()
            .insert(labels, value);
    }
}

fn owned_labels(labels: &[(&str, &str)]) -> Labels {
    let mut owned: Labels = labels
        .iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect();
    owned.sort();
    owned
}

fn escape_label(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for character in value.chars() {
        match character {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            other => escaped.push(other),
        }
    }
    escaped
}

static TEXT_FORMAT: HeaderValue = HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8");

pub async fn handle_metrics(State(registry): State<Arc<Registry>>) -> impl IntoResponse {
    ([(CONTENT_TYPE, TEXT_FORMAT.clone())], registry.render())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_value_wins_per_label_set() {
        let registry = Registry::new();
        registry.set(PLAYER_COUNT, &[("host", "a")], 3.0);
        registry.set(PLAYER_COUNT, &[("host", "b")], 9.0);
        registry.set(PLAYER_COUNT, &[("host", "a")], 4.0);
        assert_eq!(registry.get(PLAYER_COUNT, &[("host", "a")]), Some(4.0));
        assert_eq!(registry.get(PLAYER_COUNT, &[("host", "b")]), Some(9.0));
        assert_eq!(registry.get(PING_DELAY, &[("host", "a")]), None);
    }

    #[test]
    fn renders_prometheus_text() {
        let registry = Registry::new();
        registry.set(PLAYER_COUNT, &[("host", "mc.example.net")], 12.0);
        registry.set(PING_DELAY, &[("host", "mc.example.net")], 0.025);
        let text = registry.render();
        assert_eq!(
            text,
            "# HELP mcping_pingdelay Round-trip delay of the status ping in seconds\n\
             # TYPE mcping_pingdelay gauge\n\
             mcping_pingdelay{host=\"mc.example.net\"} 0.025\n\
             # HELP mcping_playercount Number of connected players\n\
             # TYPE mcping_playercount gauge\n\
             mcping_playercount{host=\"mc.example.net\"} 12\n"
        );
    }

    #[test]
    fn label_values_are_escaped() {
        let registry = Registry::new();
        registry.set(PLAYER_COUNT, &[("host", "we\"ird\\host\n")], 1.0);
        assert!(registry
            .render()
            .contains(r#"mcping_playercount{host="we\"ird\\host\n"} 1"#));
    }

    #[test]
    fn empty_registry_renders_nothing() {
        assert!(Registry::new().render().is_empty());
    }
}
