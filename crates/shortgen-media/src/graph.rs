//! Typed FFmpeg filter graph.
//!
//! The compiler builds a [`FilterGraph`] out of labeled chains of [`Filter`]
//! nodes. Nothing is turned into FFmpeg's textual `-filter_complex` syntax
//! until [`FilterGraph::to_filter_string`] is called at the process boundary,
//! so graph structure can be asserted in tests without string matching.
//!
//! Serialization rules:
//! - chains are separated by `;`
//! - filters inside a chain by `,`
//! - pads are written as `[label]`
//! - arguments are `key=value` pairs joined by `:`; values that contain
//!   graph metacharacters are single-quoted, except paths, which are
//!   escaped with [`escape_filter_path`] instead

use std::fmt;

/// Reference to a stream pad in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StreamLabel {
    /// Video stream of the `index`-th `-i` input
    InputVideo(usize),
    /// Audio stream of the `index`-th `-i` input
    InputAudio(usize),
    /// Output pad of a filter chain
    Named(String),
}

impl StreamLabel {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Argument for `-map`.
    pub fn map_spec(&self) -> String {
        match self {
            StreamLabel::InputVideo(index) => format!("{}:v", index),
            StreamLabel::InputAudio(index) => format!("{}:a", index),
            StreamLabel::Named(name) => format!("[{}]", name),
        }
    }
}

impl fmt::Display for StreamLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamLabel::InputVideo(index) => write!(f, "[{}:v]", index),
            StreamLabel::InputAudio(index) => write!(f, "[{}:a]", index),
            StreamLabel::Named(name) => write!(f, "[{}]", name),
        }
    }
}

/// A filter argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// Written as-is
    Plain(String),
    /// Written inside single quotes
    Quoted(String),
}

impl ArgValue {
    /// Quote automatically when the value contains graph metacharacters.
    pub fn auto(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.contains([',', ';', '[', ']', ':', '\'']) {
            ArgValue::Quoted(value)
        } else {
            ArgValue::Plain(value)
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ArgValue::Plain(v) | ArgValue::Quoted(v) => v,
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Plain(v) => f.write_str(v),
            ArgValue::Quoted(v) => write!(f, "'{}'", v),
        }
    }
}

/// One filter argument, named (`key=value`) or positional.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterArg {
    pub key: Option<String>,
    pub value: ArgValue,
}

/// A single filter node (`scale`, `zoompan`, `xfade`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    name: String,
    args: Vec<FilterArg>,
}

impl Filter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Add a `key=value` argument, quoting when needed.
    pub fn arg(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.args.push(FilterArg {
            key: Some(key.into()),
            value: ArgValue::auto(value.to_string()),
        });
        self
    }

    /// Add a `key='value'` argument that is always quoted.
    pub fn quoted_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.push(FilterArg {
            key: Some(key.into()),
            value: ArgValue::Quoted(value.into()),
        });
        self
    }

    /// Add a `key=value` argument whose value is already escaped.
    pub fn escaped_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.push(FilterArg {
            key: Some(key.into()),
            value: ArgValue::Plain(value.into()),
        });
        self
    }

    /// Add a positional argument.
    pub fn positional(mut self, value: impl ToString) -> Self {
        self.args.push(FilterArg {
            key: None,
            value: ArgValue::auto(value.to_string()),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[FilterArg] {
        &self.args
    }

    /// Value of a named argument.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|a| a.key.as_deref() == Some(key))
            .map(|a| a.value.as_str())
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            f.write_str(if i == 0 { "=" } else { ":" })?;
            if let Some(key) = &arg.key {
                write!(f, "{}=", key)?;
            }
            write!(f, "{}", arg.value)?;
        }
        Ok(())
    }
}

/// A linear chain of filters between input and output pads.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterChain {
    inputs: Vec<StreamLabel>,
    filters: Vec<Filter>,
    outputs: Vec<StreamLabel>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(mut self, label: StreamLabel) -> Self {
        self.inputs.push(label);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn output(mut self, label: StreamLabel) -> Self {
        self.outputs.push(label);
        self
    }

    pub fn inputs(&self) -> &[StreamLabel] {
        &self.inputs
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn outputs(&self) -> &[StreamLabel] {
        &self.outputs
    }

    /// Names of the filters in order.
    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.iter().map(Filter::name).collect()
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for label in &self.inputs {
            write!(f, "{}", label)?;
        }
        for (i, filter) in self.filters.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", filter)?;
        }
        for label in &self.outputs {
            write!(f, "{}", label)?;
        }
        Ok(())
    }
}

/// A complete filter graph for one FFmpeg invocation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterGraph {
    chains: Vec<FilterChain>,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chain: FilterChain) {
        self.chains.push(chain);
    }

    pub fn chains(&self) -> &[FilterChain] {
        &self.chains
    }

    /// Chain whose outputs include `label`.
    pub fn producer_of(&self, label: &StreamLabel) -> Option<&FilterChain> {
        self.chains.iter().find(|c| c.outputs.contains(label))
    }

    /// All filters with the given name, in graph order.
    pub fn filters_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Filter> + 'a {
        self.chains
            .iter()
            .flat_map(|c| c.filters.iter())
            .filter(move |f| f.name == name)
    }

    pub fn contains_filter(&self, name: &str) -> bool {
        self.filters_named(name).next().is_some()
    }

    /// Serialize to FFmpeg `-filter_complex` syntax.
    pub fn to_filter_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, chain) in self.chains.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{}", chain)?;
        }
        Ok(())
    }
}

/// Escape a path for use as an unquoted filter argument value.
///
/// FFmpeg unescapes twice: once when splitting the graph into filters and
/// once when splitting a filter's `key=value` options. The value is escaped
/// for the option level first (`\`, `'`, `:`), then the result for the
/// graph level (`\`, `'`, `[`, `]`, `,`, `;`).
pub fn escape_filter_path(path: &str) -> String {
    escape_chars(&escape_chars(path, &['\\', '\'', ':']), &['\\', '\'', '[', ']', ',', ';'])
}

fn escape_chars(value: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_display() {
        let filter = Filter::new("scale")
            .arg("w", 1080)
            .arg("h", 1920)
            .arg("force_original_aspect_ratio", "decrease");
        assert_eq!(
            filter.to_string(),
            "scale=w=1080:h=1920:force_original_aspect_ratio=decrease"
        );
        assert_eq!(filter.get("h"), Some("1920"));
    }

    #[test]
    fn test_auto_quotes_metacharacters() {
        let filter = Filter::new("zoompan").arg("z", "min(zoom+0.001,1.15)").arg("d", 90);
        assert_eq!(filter.to_string(), "zoompan=z='min(zoom+0.001,1.15)':d=90");
    }

    #[test]
    fn test_positional_args() {
        let filter = Filter::new("setsar").positional(1);
        assert_eq!(filter.to_string(), "setsar=1");
        assert_eq!(Filter::new("null").to_string(), "null");
    }

    #[test]
    fn test_graph_serialization() {
        let mut graph = FilterGraph::new();
        graph.push(
            FilterChain::new()
                .input(StreamLabel::InputVideo(0))
                .filter(Filter::new("setsar").positional(1))
                .filter(Filter::new("format").positional("yuv420p"))
                .output(StreamLabel::named("v0")),
        );
        graph.push(
            FilterChain::new()
                .input(StreamLabel::named("v0"))
                .input(StreamLabel::InputVideo(1))
                .filter(Filter::new("xfade").arg("duration", 0.5))
                .output(StreamLabel::named("x1")),
        );

        assert_eq!(
            graph.to_filter_string(),
            "[0:v]setsar=1,format=yuv420p[v0];[v0][1:v]xfade=duration=0.5[x1]"
        );
        assert!(graph.contains_filter("xfade"));
        assert!(!graph.contains_filter("subtitles"));
        assert!(graph.producer_of(&StreamLabel::named("x1")).is_some());
    }

    #[test]
    fn test_map_spec() {
        assert_eq!(StreamLabel::InputAudio(3).map_spec(), "3:a");
        assert_eq!(StreamLabel::named("vout").map_spec(), "[vout]");
    }

    #[test]
    fn test_escape_filter_path() {
        assert_eq!(escape_filter_path("/tmp/ws/captions.srt"), "/tmp/ws/captions.srt");
        assert_eq!(escape_filter_path("/tmp/a:b"), r"/tmp/a\\:b");
        assert_eq!(escape_filter_path("/tmp/c'd"), r"/tmp/c\\\'d");
        assert_eq!(escape_filter_path(r"/tmp/e\f"), r"/tmp/e\\\\f");
        assert_eq!(escape_filter_path("/tmp/[g],h;i"), r"/tmp/\[g\]\,h\;i");
    }
}
