//! Declarative attribute scanning over a materialized view.

use std::collections::BTreeMap;

use shared::domain::{ControllerHandle, ElementId};
use thiserror::Error;

use crate::tree::DisplayTree;

/// Carries the owning controller's handle on a view root.
pub const HANDLE_ATTR: &str = "data-shell-handle";
/// Names an element so its controller can reach it directly.
pub const REF_ATTR: &str = "data-shell-ref";
/// `event: action` pairs wired to the owning controller.
pub const ACTIONS_ATTR: &str = "data-shell-actions";
/// Dot path from the controller model to a bindable value.
pub const BIND_ATTR: &str = "data-shell-bind";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("element {element}: malformed action list '{value}': {reason}")]
    MalformedActions {
        element: ElementId,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionWiring {
    pub element: ElementId,
    pub event: String,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingWiring {
    pub element: ElementId,
    pub path: String,
}

pub fn tag_handle(tree: &mut DisplayTree, root: ElementId, handle: ControllerHandle) {
    tree.set_attribute(root, HANDLE_ATTR, handle.to_string());
}

/// Walks from `element` up through its ancestors and returns the first
/// controller handle found.
pub fn owning_handle(tree: &DisplayTree, element: ElementId) -> Option<ControllerHandle> {
    tree.ancestors(element).find_map(|id| {
        tree.attribute(id, HANDLE_ATTR)
            .and_then(|raw| raw.parse::<ControllerHandle>().ok())
    })
}

pub fn scan_refs(tree: &DisplayTree, root: ElementId) -> BTreeMap<String, ElementId> {
    let mut refs = BTreeMap::new();
    for id in tree.descendants(root) {
        if let Some(name) = tree.attribute(id, REF_ATTR) {
            let name = name.trim();
            if !name.is_empty() {
                refs.insert(name.to_string(), id);
            }
        }
    }
    refs
}

pub fn scan_actions(tree: &DisplayTree, root: ElementId) -> Result<Vec<ActionWiring>, ScanError> {
    let mut wirings = Vec::new();
    for id in tree.descendants(root) {
        let Some(raw) = tree.attribute(id, ACTIONS_ATTR) else {
            continue;
        };
        let pairs = parse_action_list(raw).map_err(|reason| ScanError::MalformedActions {
            element: id,
            value: raw.to_string(),
            reason,
        })?;
        wirings.extend(pairs.into_iter().map(|(event, action)| ActionWiring {
            element: id,
            event,
            action,
        }));
    }
    Ok(wirings)
}

pub fn scan_bindings(tree: &DisplayTree, root: ElementId) -> Vec<BindingWiring> {
    tree.descendants(root)
        .into_iter()
        .filter_map(|id| {
            let path = tree.attribute(id, BIND_ATTR)?.trim();
            (!path.is_empty()).then(|| BindingWiring {
                element: id,
                path: path.to_string(),
            })
        })
        .collect()
}

/// Parses `click: save, keyup: 'this.touch(e), again'` into ordered
/// `(event, action)` pairs. Surrounding braces are optional, `,` and `;`
/// separate pairs, and quoted or parenthesized text may contain separators.
pub fn parse_action_list(raw: &str) -> Result<Vec<(String, String)>, String> {
    let trimmed = raw.trim();
    let body = match (trimmed.strip_prefix('{'), trimmed.ends_with('}')) {
        (Some(rest), true) => &rest[..rest.len() - 1],
        (None, false) => trimmed,
        _ => return Err("unbalanced braces".to_string()),
    };

    let mut pairs = Vec::new();
    for segment in split_top_level(body)? {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let Some((event, action)) = segment.split_once(':') else {
            return Err(format!("missing ':' in '{segment}'"));
        };
        let event = unquote(event.trim());
        let action = unquote(action.trim());
        if event.is_empty() || action.is_empty() {
            return Err(format!("empty event or action in '{segment}'"));
        }
        pairs.push((event.to_string(), action.to_string()));
    }
    Ok(pairs)
}

fn split_top_level(body: &str) -> Result<Vec<&str>, String> {
    let mut segments = Vec::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    let mut start = 0;
    for (offset, ch) in body.char_indices() {
        match (quote, ch) {
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, '(' | '[' | '{') => depth += 1,
            (None, ')' | ']' | '}') => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| format!("unexpected '{ch}'"))?;
            }
            (None, ',' | ';') if depth == 0 => {
                segments.push(&body[start..offset]);
                start = offset + ch.len_utf8();
            }
            _ => {}
        }
    }
    if quote.is_some() {
        return Err("unterminated quote".to_string());
    }
    if depth != 0 {
        return Err("unbalanced brackets".to_string());
    }
    segments.push(&body[start..]);
    Ok(segments)
}

fn unquote(value: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}
