/// How a tool argument is turned into a Bear query parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamKind {
    Text,
    /// Boolean argument sent as `yes` when true, omitted otherwise.
    Flag,
    Choice(&'static [&'static str]),
}

#[derive(Debug)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub description: &'static str,
    pub required: bool,
}

/// A tool backed by one Bear x-callback-url action.
#[derive(Debug)]
pub struct ActionSpec {
    pub tool: &'static str,
    pub action: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
    /// Parameters always sent, whatever the arguments.
    pub fixed: &'static [(&'static str, &'static str)],
    pub expects_callback: bool,
    pub needs_token: bool,
    /// Reply text when there is no payload to show.
    pub done: &'static str,
}

const fn text(name: &'static str, description: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        kind: ParamKind::Text,
        description,
        required: false,
    }
}

const fn required(name: &'static str, description: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        kind: ParamKind::Text,
        description,
        required: true,
    }
}

const fn flag(name: &'static str, description: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        kind: ParamKind::Flag,
        description,
        required: false,
    }
}

const NOTE_ID: ParamSpec = text("id", "Note unique identifier");
const NOTE_TITLE: ParamSpec = text("title", "Note title (ignored if id is provided)");
const BACKGROUND: &[(&str, &str)] = &[("show_window", "no")];

pub const ACTIONS: &[ActionSpec] = &[
    ActionSpec {
        tool: "create_note",
        action: "create",
        description: "Create a new note in Bear",
        params: &[
            text("title", "Note title"),
            text("text", "Note content"),
            text("tags", "Comma separated tags (e.g., 'work,ideas')"),
            flag("clipboard", "Append clipboard content"),
            flag("timestamp", "Prepend timestamp"),
        ],
        fixed: &[("open_note", "no")],
        expects_callback: true,
        needs_token: false,
        done: "Note created",
    },
    ActionSpec {
        tool: "open_note",
        action: "open-note",
        description: "Open a specific note in Bear and return its content",
        params: &[
            NOTE_ID,
            NOTE_TITLE,
            text("header", "Header inside the note to jump to"),
            flag("exclude_trashed", "Exclude trashed notes"),
            flag("new_window", "Open in new window"),
            flag("edit", "Open note in edit mode"),
        ],
        fixed: &[],
        expects_callback: true,
        needs_token: false,
        done: "Note opened",
    },
    ActionSpec {
        tool: "add_text",
        action: "add-text",
        description: "Append or prepend text to an existing note",
        params: &[
            NOTE_ID,
            NOTE_TITLE,
            required("text", "Text to add"),
            ParamSpec {
                name: "mode",
                kind: ParamKind::Choice(&["append", "prepend", "replace", "replace_all"]),
                description: "How to add the text (default: append)",
                required: false,
            },
            flag("new_line", "Add newline before text when appending"),
            text("tags", "Comma separated tags to add"),
        ],
        fixed: &[],
        expects_callback: true,
        needs_token: false,
        done: "Text added",
    },
    ActionSpec {
        tool: "search_notes",
        action: "search",
        description: "Search for notes in Bear",
        params: &[required("term", "Search term"), text("tag", "Tag to search within")],
        fixed: BACKGROUND,
        expects_callback: true,
        needs_token: true,
        done: "Search finished",
    },
    ActionSpec {
        tool: "get_tags",
        action: "tags",
        description: "Get all tags in Bear",
        params: &[],
        fixed: BACKGROUND,
        expects_callback: true,
        needs_token: true,
        done: "Tags listed",
    },
    ActionSpec {
        tool: "open_tag",
        action: "open-tag",
        description: "Show notes with specific tag(s)",
        params: &[required("name", "Tag name(s), comma separated for multiple")],
        fixed: BACKGROUND,
        expects_callback: true,
        needs_token: true,
        done: "Tag opened",
    },
    ActionSpec {
        tool: "rename_tag",
        action: "rename-tag",
        description: "Rename an existing tag",
        params: &[required("name", "Current tag name"), required("new_name", "New tag name")],
        fixed: &[],
        expects_callback: false,
        needs_token: false,
        done: "Tag rename requested",
    },
    ActionSpec {
        tool: "delete_tag",
        action: "delete-tag",
        description: "Delete a tag from all notes",
        params: &[required("name", "Tag name to delete")],
        fixed: &[],
        expects_callback: false,
        needs_token: false,
        done: "Tag deletion requested",
    },
    ActionSpec {
        tool: "trash_note",
        action: "trash",
        description: "Move a note to trash",
        params: &[NOTE_ID, NOTE_TITLE],
        fixed: &[],
        expects_callback: false,
        needs_token: false,
        done: "Note moved to trash",
    },
    ActionSpec {
        tool: "archive_note",
        action: "archive",
        description: "Archive a note",
        params: &[NOTE_ID, NOTE_TITLE],
        fixed: &[],
        expects_callback: false,
        needs_token: false,
        done: "Note archived",
    },
    ActionSpec {
        tool: "grab_url",
        action: "grab-url",
        description: "Create a note from a webpage",
        params: &[required("url", "Webpage URL to grab"), text("tags", "Comma separated tags")],
        fixed: &[],
        expects_callback: true,
        needs_token: false,
        done: "Web page grabbed",
    },
];

#[cfg(test)]
pub fn find(tool: &str) -> Option<&'static ActionSpec> {
    ACTIONS.iter().find(|spec| spec.tool == tool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_tool_names_are_unique() {
        let names: HashSet<_> = ACTIONS.iter().map(|s| s.tool).collect();
        assert_eq!(names.len(), ACTIONS.len());
    }

    #[test]
    fn test_token_actions_wait_for_callback() {
        for spec in ACTIONS.iter().filter(|s| s.needs_token) {
            assert!(spec.expects_callback, "{} reads data but does not wait", spec.tool);
        }
    }

    #[test]
    fn test_find() {
        assert_eq!(find("trash_note").map(|s| s.action), Some("trash"));
        assert!(find("set_bear_token").is_none());
    }
}
