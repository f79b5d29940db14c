// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

/// Case-insensitive substring match used for the instant local filter.
pub fn matches_query(label: &str, query: &str) -> bool {
    let query = query.trim();
    query.is_empty() || label.to_lowercase().contains(&query.to_lowercase())
}

/// Longest completion of `buffer` shared by every candidate that starts with
/// it (case-insensitively). Returns `None` when nothing would be added.
pub fn suggest<'a, I>(buffer: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    if buffer.is_empty() {
        return None;
    }
    let needle = buffer.to_lowercase();
    let mut best: Option<Vec<char>> = None;
    for candidate in candidates {
        if !candidate.to_lowercase().starts_with(&needle) {
            continue;
        }
        let chars: Vec<char> = candidate.chars().collect();
        best = Some(match best {
            None => chars,
            Some(current) => common_prefix(&current, &chars),
        });
    }

    let completion: String = best?.into_iter().collect();
    (completion.chars().count() > buffer.chars().count()).then_some(completion)
}

fn common_prefix(left: &[char], right: &[char]) -> Vec<char> {
    left.iter()
        .zip(right)
        .take_while(|(a, b)| a.to_lowercase().eq(b.to_lowercase()))
        .map(|(a, _)| *a)
        .collect()
}
