#![forbid(unsafe_code)]

//! Edit script operations.
//!
//! The diff engine describes the difference between two frame arrays as
//! an ordered list of edits. Sibling indices are relative to a cursor the
//! recipient maintains while walking the script; `StepIn`/`StepOut` move
//! the cursor into and out of a child subtree. Frame indices point into
//! the batch's shared reference-frame buffer.

/// One operation in an edit script.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    /// Insert the referenced frame (and its subtree) before the sibling
    /// at `sibling_index`.
    PrependFrame {
        sibling_index: u32,
        frame_index: u32,
    },
    /// Remove the frame at `sibling_index`.
    RemoveFrame { sibling_index: u32 },
    /// Replace the text content at `sibling_index` with the referenced
    /// text frame's content.
    UpdateText {
        sibling_index: u32,
        frame_index: u32,
    },
    /// Replace the markup content at `sibling_index`.
    UpdateMarkup {
        sibling_index: u32,
        frame_index: u32,
    },
    /// Set or update the attribute carried by the referenced frame on the
    /// container at `sibling_index`.
    SetAttribute {
        sibling_index: u32,
        frame_index: u32,
    },
    /// Remove the named attribute from the container at `sibling_index`.
    RemoveAttribute { sibling_index: u32, name: String },
    /// Move the cursor into the children of the container at
    /// `sibling_index`.
    StepIn { sibling_index: u32 },
    /// Move the cursor back out to the parent.
    StepOut,
    /// One entry of a keyed-sibling permutation: the item currently at
    /// `from_sibling_index` ends up at `to_sibling_index`.
    PermutationListEntry {
        from_sibling_index: u32,
        to_sibling_index: u32,
    },
    /// Terminates a run of permutation entries.
    PermutationListEnd,
}

impl Edit {
    /// Whether this edit inserts, removes, or moves a whole frame, as
    /// opposed to updating content in place.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Edit::PrependFrame { .. } | Edit::RemoveFrame { .. } | Edit::PermutationListEntry { .. }
        )
    }
}
