use std::sync::LazyLock;

use regex::{Captures, Regex, Replacer};

// `$Identifier$` or `$Identifier%0<width>d$`
static IDENTIFIER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(RepresentationID|Number|Time|Bandwidth)(?:%0(\d+)d)?\$")
        .expect("identifier regex is valid")
});

/// Values substituted into `SegmentTemplate` attributes.
#[derive(Debug, Default)]
pub(crate) struct TemplateValues<'a> {
    pub representation_id: Option<&'a str>,
    pub bandwidth: Option<u64>,
}

impl TemplateValues<'_> {
    pub fn resolve(&self, template: &str) -> String {
        IDENTIFIER_REGEX
            .replace_all(template, IdentifierReplacer(self))
            .into_owned()
    }

    fn lookup(&self, identifier: &str) -> Option<String> {
        match identifier {
            "RepresentationID" => self.representation_id.map(str::to_string),
            "Bandwidth" => self.bandwidth.map(|b| b.to_string()),
            _ => None,
        }
    }
}

struct IdentifierReplacer<'a, 'b>(&'a TemplateValues<'b>);

impl Replacer for IdentifierReplacer<'_, '_> {
    fn replace_append(&mut self, caps: &Captures<'_>, dst: &mut String) {
        let value = caps.get(1).and_then(|m| self.0.lookup(m.as_str()));
        let Some(value) = value else {
            // unknown at this point, keep it for a later pass
            dst.push_str(&caps[0]);
            return;
        };

        match caps.get(2).and_then(|m| m.as_str().parse::<usize>().ok()) {
            Some(width) => dst.push_str(&format!("{value:0>width$}")),
            None => dst.push_str(&value),
        }
    }
}
