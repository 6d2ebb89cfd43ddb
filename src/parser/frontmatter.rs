use super::{Metadata, ParseError};

const OPEN: &str = "---";
const CLOSE: &[&str] = &["---", "..."];

/// Split a leading YAML front-matter block off a Markdown document.
///
/// Returns the parsed mapping and the remaining body. A document without a
/// complete `---` block comes back untouched with empty metadata.
pub fn split_front_matter(text: &str) -> Result<(Metadata, &str), ParseError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let Some(first_nl) = text.find('\n') else {
        return Ok((Metadata::new(), text));
    };
    if text[..first_nl].trim_end() != OPEN {
        return Ok((Metadata::new(), text));
    }

    let yaml_start = first_nl + 1;
    let mut pos = yaml_start;
    loop {
        let line_end = text[pos..].find('\n').map(|i| pos + i);
        let line = &text[pos..line_end.unwrap_or(text.len())];

        if CLOSE.contains(&line.trim_end()) {
            let metadata = parse_yaml(&text[yaml_start..pos])?;
            let body = line_end.map_or("", |e| &text[e + 1..]);
            return Ok((metadata, body));
        }

        match line_end {
            Some(e) => pos = e + 1,
            None => return Ok((Metadata::new(), text)),
        }
    }
}

fn parse_yaml(yaml: &str) -> Result<Metadata, ParseError> {
    if yaml.trim().is_empty() {
        return Ok(Metadata::new());
    }
    Ok(serde_yaml::from_str(yaml)?)
}
