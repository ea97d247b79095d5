use crate::models::{ChunkDraft, ChunkerOptions};
use crate::tokens::TokenEstimator;
use regex::Regex;

/// A markdown heading line: its position in the document, its level (number
/// of `#` markers) and its title text.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub line_idx: usize,
    pub level: usize,
    pub title: String,
}

impl Header {
    fn formatted(&self) -> String {
        format!("{} {}", "#".repeat(self.level), self.title)
    }
}

pub fn parse_headers(lines: &[&str]) -> Vec<Header> {
    // Unwrap is safe: the pattern is a literal.
    let header_pattern = Regex::new(r"^(#+)\s+(.*)").expect("static header pattern");
    lines
        .iter()
        .enumerate()
        .filter_map(|(line_idx, line)| {
            header_pattern.captures(line).map(|capture| Header {
                line_idx,
                level: capture[1].len(),
                title: capture[2].trim().to_string(),
            })
        })
        .collect()
}

/// Ancestor chain for the header at `line_idx`: the nearest preceding header
/// of each strictly smaller level, accumulated bottom-up until level 1.
pub fn parent_headers(line_idx: usize, headers: &[Header]) -> Vec<String> {
    let Some(position) = headers.iter().position(|header| header.line_idx == line_idx) else {
        return Vec::new();
    };

    let mut current_level = headers[position].level;
    if current_level == 1 {
        return Vec::new();
    }

    let mut parents = Vec::new();
    for header in headers[..position].iter().rev() {
        if header.level < current_level {
            parents.insert(0, header.formatted());
            current_level = header.level;
        }
    }
    parents
}

/// Splits a header-annotated markdown document into ordered, token-bounded
/// chunk drafts. Every chunk produced under a header carries its full header
/// lineage as a prefix so it reads in context on its own. Pure computation;
/// empty input yields zero chunks.
pub fn chunk_markdown(
    content: &str,
    options: &ChunkerOptions,
    estimator: &dyn TokenEstimator,
) -> Vec<ChunkDraft> {
    if content.trim().is_empty() {
        return Vec::new();
    }

    let lines: Vec<&str> = content.lines().collect();
    let headers = parse_headers(&lines);
    let mut drafts = Vec::new();

    if headers.is_empty() {
        split_section(&lines, &[], options, estimator, &mut drafts);
        return drafts;
    }

    // Text before the first header has no lineage to attach.
    let preamble = &lines[..headers[0].line_idx];
    if preamble.iter().any(|line| !line.trim().is_empty()) {
        split_section(preamble, &[], options, estimator, &mut drafts);
    }

    for (position, header) in headers.iter().enumerate() {
        let end = headers
            .get(position + 1)
            .map(|next| next.line_idx)
            .unwrap_or(lines.len());
        let body = &lines[header.line_idx + 1..end];

        let mut lineage = parent_headers(header.line_idx, &headers);
        lineage.push(header.formatted());

        split_section(body, &lineage, options, estimator, &mut drafts);
    }

    drafts
}

/// Accumulates body lines into chunks while the running token cost stays
/// within budget, then merges an undersized trailing chunk into its
/// predecessor. `lineage` is prefixed to every closed chunk.
fn split_section(
    body: &[&str],
    lineage: &[String],
    options: &ChunkerOptions,
    estimator: &dyn TokenEstimator,
    drafts: &mut Vec<ChunkDraft>,
) {
    let mut chunks: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for line in body {
        let mut candidate = current.clone();
        candidate.push((*line).to_string());
        if estimator.count(candidate.join("\n").trim()) <= options.max_chunk_tokens {
            current = candidate;
        } else {
            chunks.push(with_prefix(lineage, &current));
            current = vec![(*line).to_string()];
        }
    }

    if estimator.count(current.join("\n").trim()) < options.min_chunk_tokens {
        match chunks.last_mut() {
            // An undersized tail rides along with the previous chunk instead
            // of being emitted on its own.
            Some(last) => last.extend(current),
            None => chunks.push(current),
        }
    } else {
        chunks.push(with_prefix(lineage, &current));
    }

    for chunk in chunks {
        let text = chunk.join("\n").trim().to_string();
        if text.is_empty() {
            // A header with no body still yields its heading line as a chunk.
            if lineage.is_empty() {
                continue;
            }
            drafts.push(ChunkDraft {
                text: lineage.join("\n"),
                header_path: lineage.to_vec(),
            });
            continue;
        }
        drafts.push(ChunkDraft {
            text,
            header_path: lineage.to_vec(),
        });
    }
}

fn with_prefix(lineage: &[String], lines: &[String]) -> Vec<String> {
    let mut chunk = lineage.to_vec();
    chunk.extend_from_slice(lines);
    chunk
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::WordEstimator;

    fn options(max: usize, min: usize) -> ChunkerOptions {
        ChunkerOptions {
            max_chunk_tokens: max,
            min_chunk_tokens: min,
        }
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let drafts = chunk_markdown("   \n\n", &options(10, 2), &WordEstimator);
        assert!(drafts.is_empty());
    }

    #[test]
    fn headerless_document_is_split_by_token_budget_without_prefix() {
        let content = "one two three\nfour five six\nseven eight nine";
        let drafts = chunk_markdown(content, &options(6, 1), &WordEstimator);

        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].text, "one two three\nfour five six");
        assert_eq!(drafts[1].text, "seven eight nine");
        assert!(drafts[0].header_path.is_empty());
    }

    #[test]
    fn sibling_sections_share_the_same_ancestor_prefix() {
        let content = "# A\n## B\nbody of section b here now\n## C\nbody of section c here now";
        let drafts = chunk_markdown(content, &options(20, 1), &WordEstimator);

        let under_b = drafts
            .iter()
            .find(|draft| draft.text.contains("section b"))
            .expect("chunk under B");
        let under_c = drafts
            .iter()
            .find(|draft| draft.text.contains("section c"))
            .expect("chunk under C");

        assert_eq!(under_b.header_path, vec!["# A", "## B"]);
        assert_eq!(under_c.header_path, vec!["# A", "## C"]);
        assert!(under_b.text.starts_with("# A\n## B\n"));
        assert!(under_c.text.starts_with("# A\n## C\n"));
    }

    #[test]
    fn ancestor_chain_takes_nearest_strictly_smaller_levels() {
        let lines = vec!["# A", "## B", "### D", "## C", "### E"];
        let headers = parse_headers(&lines);

        // E's chain skips the earlier sibling subtree under B entirely.
        assert_eq!(parent_headers(4, &headers), vec!["# A", "## C"]);
        assert_eq!(parent_headers(2, &headers), vec!["# A", "## B"]);
        assert!(parent_headers(0, &headers).is_empty());
    }

    #[test]
    fn undersized_trailing_chunk_merges_into_previous() {
        let content = "alpha beta gamma delta\nepsilon zeta eta theta\ntail";
        let drafts = chunk_markdown(content, &options(4, 2), &WordEstimator);

        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].text, "alpha beta gamma delta");
        // The one-word tail is under min_chunk_tokens and joins chunk two.
        assert_eq!(drafts[1].text, "epsilon zeta eta theta\ntail");
    }

    #[test]
    fn lone_undersized_document_still_yields_one_chunk() {
        let drafts = chunk_markdown("tiny", &options(10, 5), &WordEstimator);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].text, "tiny");
    }

    #[test]
    fn non_trailing_chunks_respect_the_token_budget() {
        let content = "w1 w2\nw3 w4\nw5 w6\nw7 w8\nw9 w10";
        let max = 4;
        let drafts = chunk_markdown(content, &options(max, 1), &WordEstimator);

        assert!(drafts.len() > 1);
        for draft in &drafts[..drafts.len() - 1] {
            assert!(WordEstimator.count(&draft.text) <= max);
        }
    }

    #[test]
    fn chunk_ordering_matches_document_order() {
        let content = "# A\nfirst section body text here\n# B\nsecond section body text here";
        let drafts = chunk_markdown(content, &options(20, 1), &WordEstimator);

        let first = drafts
            .iter()
            .position(|draft| draft.text.contains("first"))
            .expect("first section present");
        let second = drafts
            .iter()
            .position(|draft| draft.text.contains("second"))
            .expect("second section present");
        assert!(first < second);
    }

    #[test]
    fn header_with_no_body_emits_its_heading_line() {
        let drafts = chunk_markdown("# Only a title", &options(10, 2), &WordEstimator);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].text, "# Only a title");
    }
}
