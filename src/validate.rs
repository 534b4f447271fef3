use thiserror::Error;

use super::{Color, NodeId, RedBlackTree};

/// The first broken rule found by [`RedBlackTree::check`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("root node is red")]
    RedRoot,
    #[error("red node {key:?} has a red child")]
    RedViolation { key: String },
    #[error("black height below {key:?} is {found}, expected {expected}")]
    BlackHeightMismatch {
        key: String,
        expected: usize,
        found: usize,
    },
    #[error("key {key:?} is out of order")]
    OrderViolation { key: String },
    #[error("node {key:?} does not point back at its parent")]
    ParentLink { key: String },
    #[error("tree reaches {found} nodes but records {expected}")]
    SizeMismatch { expected: usize, found: usize },
}

struct Frame<'a> {
    id: NodeId,
    /// Black nodes above `id`.
    blacks: usize,
    lower: Option<&'a str>,
    upper: Option<&'a str>,
}

impl<V> RedBlackTree<V> {
    /// Whether the tree currently satisfies every red-black rule.
    pub fn validate(&self) -> bool {
        self.check().is_ok()
    }

    /// Walks the whole tree and reports the first broken rule.
    ///
    /// Besides the color rules this checks key order, parent back-links and
    /// the recorded length. The black count of the first leaf position
    /// reached (the leftmost) is the one every other path must match.
    pub fn check(&self) -> Result<(), ValidationError> {
        let Some(root) = self.root else {
            return match self.count {
                0 => Ok(()),
                n => Err(ValidationError::SizeMismatch {
                    expected: n,
                    found: 0,
                }),
            };
        };
        if self.node(root).color == Color::Red {
            return Err(ValidationError::RedRoot);
        }
        if self.node(root).parent.is_some() {
            return Err(ValidationError::ParentLink {
                key: self.node(root).key.to_string(),
            });
        }

        let mut expected_blacks: Option<usize> = None;
        let mut seen = 0usize;
        let mut stack = vec![Frame {
            id: root,
            blacks: 0,
            lower: None,
            upper: None,
        }];

        while let Some(frame) = stack.pop() {
            let node = self.node(frame.id);
            let key: &str = &node.key;
            seen += 1;

            if frame.lower.is_some_and(|lower| key <= lower)
                || frame.upper.is_some_and(|upper| key >= upper)
            {
                return Err(ValidationError::OrderViolation {
                    key: key.to_string(),
                });
            }

            let blacks = frame.blacks + usize::from(node.color == Color::Black);

            for child in [node.left, node.right] {
                let Some(child) = child else {
                    let expected = *expected_blacks.get_or_insert(blacks);
                    if blacks != expected {
                        return Err(ValidationError::BlackHeightMismatch {
                            key: key.to_string(),
                            expected,
                            found: blacks,
                        });
                    }
                    continue;
                };

                let child_node = self.node(child);
                if node.color == Color::Red && child_node.color == Color::Red {
                    return Err(ValidationError::RedViolation {
                        key: key.to_string(),
                    });
                }
                if child_node.parent != Some(frame.id) {
                    return Err(ValidationError::ParentLink {
                        key: child_node.key.to_string(),
                    });
                }
            }

            // Right first so the left subtree is walked first.
            for (child, lower, upper) in [
                (node.right, Some(key), frame.upper),
                (node.left, frame.lower, Some(key)),
            ] {
                if let Some(id) = child {
                    stack.push(Frame {
                        id,
                        blacks,
                        lower,
                        upper,
                    });
                }
            }
        }

        if seen != self.count {
            return Err(ValidationError::SizeMismatch {
                expected: self.count,
                found: seen,
            });
        }
        Ok(())
    }
}
