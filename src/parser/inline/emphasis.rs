/// Emphasis resolution: flanking analysis and the delimiter stack.
///
/// Delimiter tokens stay immutable; resolution writes into an external
/// match table keyed by token index. The builder then replays the table to
/// nest `Emphasis`/`Strong`/`Strikethrough` nodes.
use super::InlineTok;

/// One resolved delimiter pair.
///
/// `use_count` is how many marker characters each side spends: 2 makes a
/// `Strong` (or `Strikethrough` for `~~`), 1 an `Emphasis`. Pairs between
/// the same two tokens are recorded innermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelimiterPair {
    pub opener: usize,
    pub closer: usize,
    pub use_count: usize,
}

/// Match table for one token list: pairs plus the leftover marker count of
/// every delimiter token after resolution.
#[derive(Debug, Default)]
pub struct MatchTable {
    pub pairs: Vec<DelimiterPair>,
    pub leftover: Vec<usize>,
}

/// Character class for flanking decisions. CommonMark groups Unicode
/// punctuation and symbols together; anything that is neither alphanumeric
/// nor whitespace lands there.
fn is_punctuation(ch: char) -> bool {
    !ch.is_alphanumeric() && !ch.is_whitespace()
}

/// Computed open/close capability of a delimiter run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flanking {
    pub can_open: bool,
    pub can_close: bool,
}

/// Applies the CommonMark flanking rules to a run of `marker` characters.
///
/// `before` and `after` are the characters adjacent to the run; `None`
/// means start or end of the text and counts as whitespace.
pub fn flanking(marker: char, before: Option<char>, after: Option<char>) -> Flanking {
    let before_ws = before.map_or(true, char::is_whitespace);
    let after_ws = after.map_or(true, char::is_whitespace);
    let before_punct = before.map_or(false, is_punctuation);
    let after_punct = after.map_or(false, is_punctuation);

    let left_flanking = !after_ws && (!after_punct || before_ws || before_punct);
    let right_flanking = !before_ws && (!before_punct || after_ws || after_punct);

    match marker {
        '_' => Flanking {
            // Underscores refuse intraword emphasis.
            can_open: left_flanking && (!right_flanking || before_punct),
            can_close: right_flanking && (!left_flanking || after_punct),
        },
        _ => Flanking {
            can_open: left_flanking,
            can_close: right_flanking,
        },
    }
}

/// Resolves all delimiter runs in `tokens` into a [`MatchTable`].
///
/// Standard delimiter-stack pass: closers search the stack top-down for a
/// compatible opener, the rule of 3 rejects some `*`/`_` pairings, and
/// openers skipped over by a successful match are deactivated.
pub fn resolve(tokens: &[InlineTok]) -> MatchTable {
    let mut remaining = vec![0usize; tokens.len()];
    let mut pairs: Vec<DelimiterPair> = Vec::new();
    // Stack of candidate opener token indices, bottom to top.
    let mut openers: Vec<usize> = Vec::new();

    for (idx, tok) in tokens.iter().enumerate() {
        let InlineTok::Delim {
            marker,
            count,
            can_open,
            can_close,
            ..
        } = *tok
        else {
            continue;
        };
        remaining[idx] = count;

        // Strikethrough only pairs exact double tildes.
        if marker == '~' && count != 2 {
            continue;
        }

        if can_close {
            let mut search_top = openers.len();
            while remaining[idx] > 0 && search_top > 0 {
                let slot = search_top - 1;
                let opener_idx = openers[slot];
                let InlineTok::Delim {
                    marker: o_marker,
                    count: o_count,
                    can_open: o_open,
                    can_close: o_close,
                    ..
                } = tokens[opener_idx]
                else {
                    search_top = slot;
                    continue;
                };

                if o_marker != marker || remaining[opener_idx] == 0 {
                    search_top = slot;
                    continue;
                }

                if rule_of_three_blocks(
                    marker, o_count, count, o_open, o_close, can_open, can_close,
                ) {
                    search_top = slot;
                    continue;
                }

                let use_count = if remaining[opener_idx] >= 2 && remaining[idx] >= 2 {
                    2
                } else {
                    1
                };
                pairs.push(DelimiterPair {
                    opener: opener_idx,
                    closer: idx,
                    use_count,
                });
                remaining[opener_idx] -= use_count;
                remaining[idx] -= use_count;

                // Openers between the matched pair can never match again.
                openers.truncate(slot + 1);
                if remaining[opener_idx] == 0 {
                    openers.pop();
                }
                search_top = openers.len();
            }
        }

        if can_open && remaining[idx] > 0 {
            openers.push(idx);
        }
    }

    MatchTable {
        pairs,
        leftover: remaining,
    }
}

/// Rule of 3: when a delimiter can both open and close, runs whose lengths
/// sum to a multiple of 3 cannot pair up, unless both lengths are
/// themselves multiples of 3. Only applies to `*` and `_`.
#[allow(clippy::too_many_arguments)]
fn rule_of_three_blocks(
    marker: char,
    opener_count: usize,
    closer_count: usize,
    opener_can_open: bool,
    opener_can_close: bool,
    closer_can_open: bool,
    closer_can_close: bool,
) -> bool {
    if marker == '~' {
        return false;
    }
    let ambiguous = (opener_can_open && opener_can_close) || (closer_can_open && closer_can_close);
    ambiguous
        && (opener_count + closer_count) % 3 == 0
        && !(opener_count % 3 == 0 && closer_count % 3 == 0)
}
