//! Line-level diff for proposal preview.
//!
//! Computes an advisory diff between the live chapter body and a
//! proposed replacement. The output is read-only UI state: applying a
//! proposal never checks whether the diff was rendered or viewed.

use serde::Serialize;

/// Classification of one diffed line run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffTag {
    Unchanged,
    Removed,
    Added,
}

/// A run of consecutive lines sharing one tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffRun {
    pub tag: DiffTag,
    pub text: String,
}

/// Diff two documents line by line.
///
/// Removed runs come from `current`, added runs from `proposed`,
/// unchanged runs from their longest common subsequence. Runs appear
/// in document order; for a replaced region the removal precedes the
/// addition.
pub fn diff_lines(current: &str, proposed: &str) -> Vec<DiffRun> {
    if current == proposed {
        if current.is_empty() {
            return Vec::new();
        }
        return vec![DiffRun {
            tag: DiffTag::Unchanged,
            text: current.to_string(),
        }];
    }

    // An empty document splits into one empty line; treating it as a
    // real line would emit a phantom removal or addition.
    if current.is_empty() {
        return vec![DiffRun {
            tag: DiffTag::Added,
            text: proposed.to_string(),
        }];
    }
    if proposed.is_empty() {
        return vec![DiffRun {
            tag: DiffTag::Removed,
            text: current.to_string(),
        }];
    }

    let a: Vec<&str> = current.split('\n').collect();
    let b: Vec<&str> = proposed.split('\n').collect();

    // Trim the common prefix and suffix before running the quadratic
    // LCS table; edits are usually local so this keeps the table small.
    let mut prefix = 0;
    while prefix < a.len() && prefix < b.len() && a[prefix] == b[prefix] {
        prefix += 1;
    }
    let mut suffix = 0;
    while suffix < a.len() - prefix && suffix < b.len() - prefix
        && a[a.len() - 1 - suffix] == b[b.len() - 1 - suffix]
    {
        suffix += 1;
    }

    let mid_a = &a[prefix..a.len() - suffix];
    let mid_b = &b[prefix..b.len() - suffix];

    let mut tagged: Vec<(DiffTag, &str)> = Vec::with_capacity(a.len().max(b.len()));
    for line in &a[..prefix] {
        tagged.push((DiffTag::Unchanged, line));
    }
    lcs_diff(mid_a, mid_b, &mut tagged);
    for line in &a[a.len() - suffix..] {
        tagged.push((DiffTag::Unchanged, line));
    }

    coalesce(tagged)
}

/// Standard LCS dynamic program over the trimmed middle section.
fn lcs_diff<'a>(a: &[&'a str], b: &[&'a str], out: &mut Vec<(DiffTag, &'a str)>) {
    let n = a.len();
    let m = b.len();
    // lcs[i][j] = LCS length of a[i..] and b[j..]
    let mut lcs = vec![0u32; (n + 1) * (m + 1)];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i * (m + 1) + j] = if a[i] == b[j] {
                lcs[(i + 1) * (m + 1) + j + 1] + 1
            } else {
                lcs[(i + 1) * (m + 1) + j].max(lcs[i * (m + 1) + j + 1])
            };
        }
    }

    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            out.push((DiffTag::Unchanged, a[i]));
            i += 1;
            j += 1;
        } else if lcs[(i + 1) * (m + 1) + j] >= lcs[i * (m + 1) + j + 1] {
            out.push((DiffTag::Removed, a[i]));
            i += 1;
        } else {
            out.push((DiffTag::Added, b[j]));
            j += 1;
        }
    }
    while i < n {
        out.push((DiffTag::Removed, a[i]));
        i += 1;
    }
    while j < m {
        out.push((DiffTag::Added, b[j]));
        j += 1;
    }
}

/// Merge consecutive same-tag lines into runs, removals before
/// additions within a replaced region.
fn coalesce(tagged: Vec<(DiffTag, &str)>) -> Vec<DiffRun> {
    let mut runs: Vec<DiffRun> = Vec::new();
    for (tag, line) in tagged {
        match runs.last_mut() {
            Some(run) if run.tag == tag => {
                run.text.push('\n');
                run.text.push_str(line);
            }
            _ => runs.push(DiffRun {
                tag,
                text: line.to_string(),
            }),
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_input_is_one_unchanged_run() {
        let runs = diff_lines("a\nb\nc", "a\nb\nc");
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].tag, DiffTag::Unchanged);
        assert_eq!(runs[0].text, "a\nb\nc");
    }

    #[test]
    fn empty_inputs_produce_no_runs() {
        assert!(diff_lines("", "").is_empty());
    }

    #[test]
    fn empty_side_emits_a_single_run() {
        assert_eq!(
            diff_lines("", "a\nb"),
            vec![DiffRun {
                tag: DiffTag::Added,
                text: "a\nb".into()
            }]
        );
        assert_eq!(
            diff_lines("a\nb", ""),
            vec![DiffRun {
                tag: DiffTag::Removed,
                text: "a\nb".into()
            }]
        );
    }

    #[test]
    fn pure_addition() {
        let runs = diff_lines("a\nb", "a\nb\nc\nd");
        assert_eq!(
            runs,
            vec![
                DiffRun {
                    tag: DiffTag::Unchanged,
                    text: "a\nb".into()
                },
                DiffRun {
                    tag: DiffTag::Added,
                    text: "c\nd".into()
                },
            ]
        );
    }

    #[test]
    fn pure_removal() {
        let runs = diff_lines("a\nb\nc", "a\nc");
        assert_eq!(
            runs,
            vec![
                DiffRun {
                    tag: DiffTag::Unchanged,
                    text: "a".into()
                },
                DiffRun {
                    tag: DiffTag::Removed,
                    text: "b".into()
                },
                DiffRun {
                    tag: DiffTag::Unchanged,
                    text: "c".into()
                },
            ]
        );
    }

    #[test]
    fn replacement_emits_removal_then_addition() {
        let runs = diff_lines("keep\nold line\nkeep2", "keep\nnew line\nkeep2");
        assert_eq!(runs.len(), 4);
        assert_eq!(runs[1].tag, DiffTag::Removed);
        assert_eq!(runs[1].text, "old line");
        assert_eq!(runs[2].tag, DiffTag::Added);
        assert_eq!(runs[2].text, "new line");
    }

    #[test]
    fn removed_covers_current_added_covers_proposed() {
        let current = "one\ntwo\nthree";
        let proposed = "zero\ntwo\nfour";
        let runs = diff_lines(current, proposed);

        let from_current: Vec<&str> = runs
            .iter()
            .filter(|r| r.tag != DiffTag::Added)
            .map(|r| r.text.as_str())
            .collect();
        assert_eq!(from_current.join("\n"), current);

        let from_proposed: Vec<&str> = runs
            .iter()
            .filter(|r| r.tag != DiffTag::Removed)
            .map(|r| r.text.as_str())
            .collect();
        assert_eq!(from_proposed.join("\n"), proposed);
    }
}
