//! Closure path tries.
//!
//! One trie per captured root. Reading `ctx.a.b` and `ctx.a.c` carries
//! `{ ctx: { a: { b: ctx.a.b, c: ctx.a.c } } }`; any shallower read of the same root
//! collapses the trie at that depth.

use crate::config::WorkletConfig;
use crate::directive::WorkletFunction;
use crate::scope::{free_variables, FreeVariableRef, FreeVariables, UnsupportedConstruct};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathTrieNode {
    /// Insertion ordered, so generated closures are deterministic.
    pub children: Vec<(String, PathTrieNode)>,
    pub terminal: bool,
    /// Reference that made this node terminal.
    pub origin: Option<FreeVariableRef>,
}

impl PathTrieNode {
    fn child_mut(&mut self, segment: &str) -> &mut PathTrieNode {
        let index = match self.children.iter().position(|(name, _)| name == segment) {
            Some(index) => index,
            None => {
                self.children
                    .push((segment.to_string(), PathTrieNode::default()));
                self.children.len() - 1
            }
        };
        &mut self.children[index].1
    }

    pub fn child(&self, segment: &str) -> Option<&PathTrieNode> {
        self.children
            .iter()
            .find(|(name, _)| name == segment)
            .map(|(_, node)| node)
    }

    fn mark_terminal(&mut self, reference: &FreeVariableRef) {
        self.terminal = true;
        self.children.clear();
        self.origin = Some(reference.clone());
    }

    /// Terminal nodes read the original access; inner nodes build an object literal.
    fn generate(&self) -> String {
        if self.terminal {
            return self
                .origin
                .as_ref()
                .map(|r| r.access_expression())
                .unwrap_or_else(|| "undefined".to_string());
        }
        object_literal(
            self.children
                .iter()
                .map(|(name, child)| (name.as_str(), child.generate())),
        )
    }
}

fn object_literal<'s>(entries: impl Iterator<Item = (&'s str, String)>) -> String {
    let properties: Vec<String> = entries
        .map(|(key, value)| {
            if key == value {
                key.to_string()
            } else {
                format!("{}: {}", key, value)
            }
        })
        .collect();
    if properties.is_empty() {
        "{}".to_string()
    } else {
        format!("{{ {} }}", properties.join(", "))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClosureTrie {
    roots: Vec<(String, PathTrieNode)>,
}

impl ClosureTrie {
    pub fn build(references: &[FreeVariableRef]) -> Self {
        let mut trie = ClosureTrie::default();
        for reference in references {
            trie.insert(reference);
        }
        trie
    }

    pub fn insert(&mut self, reference: &FreeVariableRef) {
        let index = match self.roots.iter().position(|(name, _)| name == &reference.root) {
            Some(index) => index,
            None => {
                self.roots
                    .push((reference.root.clone(), PathTrieNode::default()));
                self.roots.len() - 1
            }
        };
        let mut node = &mut self.roots[index].1;
        if node.terminal {
            return;
        }
        for segment in &reference.path {
            node = node.child_mut(segment);
            if node.terminal {
                // a shallower read already carries this one
                return;
            }
        }
        node.mark_terminal(reference);
    }

    pub fn root(&self, name: &str) -> Option<&PathTrieNode> {
        self.roots
            .iter()
            .find(|(root, _)| root == name)
            .map(|(_, node)| node)
    }

    /// Captured root names in order of first reference.
    pub fn variables(&self) -> Vec<&str> {
        self.roots.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Object literal holding exactly the reached leaves of every root.
    pub fn generate(&self) -> String {
        object_literal(
            self.roots
                .iter()
                .map(|(name, node)| (name.as_str(), node.generate())),
        )
    }
}

/// Result of the analysis phase, handed as a value to the rewriter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosurePlan {
    pub free_variables: FreeVariables,
    pub trie: ClosureTrie,
}

impl ClosurePlan {
    pub fn analyze(
        function: WorkletFunction,
        config: &WorkletConfig,
    ) -> Result<Self, UnsupportedConstruct> {
        let free_variables = free_variables(function, config)?;
        let trie = ClosureTrie::build(&free_variables.references);
        Ok(ClosurePlan {
            free_variables,
            trie,
        })
    }

    pub fn variables(&self) -> Vec<&str> {
        self.trie.variables()
    }

    pub fn closure_object(&self) -> String {
        self.trie.generate()
    }
}
