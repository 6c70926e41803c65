//! Prefix trie shared by all surviving beam hypotheses.
//!
//! Every node stands for one prefix (the labels on the path from the root).
//! Nodes live in an arena indexed by `NodeId`; parent links are indices, so
//! removal walks upward iteratively and freed slots are recycled through a
//! freelist. The root (id 0) is never freed.

use std::sync::Arc;

use rustfst::{Label, StateId};

use crate::alphabet::Alphabet;
use crate::lexicon::Lexicon;
use crate::logmath::{log_sum_exp, LOG_ZERO};

pub(crate) type NodeId = u32;

pub(crate) const ROOT: NodeId = 0;

pub(crate) struct Node {
    /// Label of the last step of this prefix; `None` only at the root.
    pub character: Option<u32>,
    /// Frame at which this label was (best) emitted.
    pub timestep: usize,
    pub parent: Option<NodeId>,
    /// Children in creation order; lookup is a linear scan.
    children: Vec<(u32, NodeId)>,
    /// Committed log-probabilities: paths ending in blank / in `character`.
    pub log_prob_b_prev: f32,
    pub log_prob_nb_prev: f32,
    /// Accumulators for the frame currently being processed.
    pub log_prob_b_cur: f32,
    pub log_prob_nb_cur: f32,
    /// Best single-frame emission log-probability seen for this label.
    pub log_prob_c: f32,
    /// `log_sum_exp(log_prob_b_prev, log_prob_nb_prev)`, refreshed at
    /// frame commit.
    pub score: f32,
    /// Cleared when the hypothesis is pruned; the node may stay allocated
    /// as an interior ancestor of live descendants.
    pub exists: bool,
    /// Lexicon FST state reached by this prefix (meaningful only when a
    /// lexicon is attached to the trie).
    dict_state: StateId,
}

impl Node {
    fn new(character: u32, timestep: usize, parent: NodeId, log_prob_c: f32) -> Self {
        Self {
            character: Some(character),
            timestep,
            parent: Some(parent),
            children: Vec::new(),
            log_prob_b_prev: LOG_ZERO,
            log_prob_nb_prev: LOG_ZERO,
            log_prob_b_cur: LOG_ZERO,
            log_prob_nb_cur: LOG_ZERO,
            log_prob_c,
            score: LOG_ZERO,
            exists: true,
            dict_state: 0,
        }
    }
}

pub(crate) struct PathTrie {
    nodes: Vec<Node>,
    free: Vec<NodeId>,
    lexicon: Option<Arc<Lexicon>>,
}

impl PathTrie {
    /// A trie holding only the root, which carries probability one of
    /// having emitted nothing.
    pub fn new() -> Self {
        let mut root = Node::new(0, 0, 0, LOG_ZERO);
        root.character = None;
        root.parent = None;
        root.log_prob_b_prev = 0.0;
        root.score = 0.0;
        Self {
            nodes: vec![root],
            free: Vec::new(),
            lexicon: None,
        }
    }

    /// Constrain future extensions to prefixes accepted by the lexicon.
    pub fn attach_lexicon(&mut self, lexicon: Arc<Lexicon>) {
        self.nodes[ROOT as usize].dict_state = lexicon.start();
        self.lexicon = Some(lexicon);
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id as usize]
    }

    pub fn is_root(&self, id: NodeId) -> bool {
        id == ROOT
    }

    fn find_child(&self, parent: NodeId, character: u32) -> Option<NodeId> {
        self.nodes[parent as usize]
            .children
            .iter()
            .find(|&&(c, _)| c == character)
            .map(|&(_, id)| id)
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id as usize] = node;
                id
            }
            None => {
                let id = self.nodes.len() as NodeId;
                self.nodes.push(node);
                id
            }
        }
    }

    /// Extend a prefix by one label, reusing (and reviving) an existing
    /// child when present.
    ///
    /// An existing leaf child that saw a larger single-frame emission has
    /// its `timestep` moved to the new frame; non-leaves keep theirs so
    /// descendants never point earlier than their ancestors. A tombstoned
    /// child restarts with cleared probabilities.
    ///
    /// With a lexicon attached, a missing child is only allocated when the
    /// FST accepts the transition. On a miss from a final state (`reset`
    /// set) the prefix's state snaps back to the FST start so the next word
    /// can begin. A hit into a final *leaf* state starts the next word
    /// fresh the same way; a final state that still has continuations is
    /// kept, so a word that prefixes a longer one stays extendable.
    pub fn extend(
        &mut self,
        prefix: NodeId,
        character: u32,
        timestep: usize,
        log_prob_c: f32,
        reset: bool,
    ) -> Option<NodeId> {
        if let Some(child_id) = self.find_child(prefix, character) {
            let is_leaf = self.nodes[child_id as usize].children.is_empty();
            let child = &mut self.nodes[child_id as usize];
            if child.log_prob_c < log_prob_c && is_leaf {
                child.log_prob_c = log_prob_c;
                child.timestep = timestep;
            }
            if !child.exists {
                child.exists = true;
                child.log_prob_b_prev = LOG_ZERO;
                child.log_prob_nb_prev = LOG_ZERO;
                child.log_prob_b_cur = LOG_ZERO;
                child.log_prob_nb_cur = LOG_ZERO;
            }
            return Some(child_id);
        }

        let dict_state = match &self.lexicon {
            None => 0,
            Some(lexicon) => {
                let state = self.nodes[prefix as usize].dict_state;
                let ilabel = Alphabet::fst_input_label(character) as Label;
                match lexicon.advance(state, ilabel) {
                    None => {
                        // Prefix would leave the lexicon. If a word just
                        // ended here, rewind so the next one can start.
                        if lexicon.is_final(state) && reset {
                            self.nodes[prefix as usize].dict_state = lexicon.start();
                        }
                        return None;
                    }
                    Some(next) => {
                        if lexicon.is_final_leaf(next) && reset {
                            lexicon.start()
                        } else {
                            next
                        }
                    }
                }
            }
        };

        let mut node = Node::new(character, timestep, prefix, log_prob_c);
        node.dict_state = dict_state;
        let id = self.alloc(node);
        self.nodes[prefix as usize].children.push((character, id));
        Some(id)
    }

    /// Pre-order traversal over live nodes, committing the frame at each:
    /// current accumulators become the committed values, accumulators are
    /// cleared, and `score` is refreshed.
    pub fn collect(&mut self, out: &mut Vec<NodeId>) {
        let mut stack = vec![ROOT];
        while let Some(id) = stack.pop() {
            let node = &mut self.nodes[id as usize];
            if node.exists {
                node.log_prob_b_prev = node.log_prob_b_cur;
                node.log_prob_nb_prev = node.log_prob_nb_cur;
                node.log_prob_b_cur = LOG_ZERO;
                node.log_prob_nb_cur = LOG_ZERO;
                node.score = log_sum_exp(node.log_prob_b_prev, node.log_prob_nb_prev);
                out.push(id);
            }
            for &(_, child) in node.children.iter().rev() {
                stack.push(child);
            }
        }
    }

    /// Prune a hypothesis. Childless tombstones are freed and the walk
    /// continues upward through ancestors that became childless tombstones
    /// themselves; the root always stays.
    pub fn remove(&mut self, id: NodeId) {
        self.nodes[id as usize].exists = false;
        let mut current = id;
        loop {
            let node = &self.nodes[current as usize];
            if node.exists || !node.children.is_empty() {
                break;
            }
            let Some(parent) = node.parent else {
                break;
            };
            self.nodes[parent as usize]
                .children
                .retain(|&(_, child)| child != current);
            self.free.push(current);
            current = parent;
        }
    }

    /// Labels and timesteps of the prefix, in emission order.
    pub fn path(&self, id: NodeId) -> (Vec<u32>, Vec<usize>) {
        let mut labels = Vec::new();
        let mut timesteps = Vec::new();
        let mut current = id;
        while let Some(character) = self.nodes[current as usize].character {
            labels.push(character);
            timesteps.push(self.nodes[current as usize].timestep);
            match self.nodes[current as usize].parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        labels.reverse();
        timesteps.reverse();
        (labels, timesteps)
    }

    /// Labels since the previous space (exclusive), plus the node the walk
    /// stopped at (the space, or the root).
    pub fn prev_word(&self, id: NodeId, space_id: Option<u32>) -> (Vec<u32>, NodeId) {
        let mut labels = Vec::new();
        let mut current = id;
        loop {
            let node = &self.nodes[current as usize];
            let Some(character) = node.character else {
                break;
            };
            if space_id == Some(character) {
                break;
            }
            labels.push(character);
            match node.parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        labels.reverse();
        (labels, current)
    }

    /// Labels of the codepoint ending at this node (byte mode), plus the
    /// node the walk stopped at (the codepoint's first byte, or the root).
    pub fn prev_grapheme(&self, id: NodeId) -> (Vec<u32>, NodeId) {
        let mut labels = Vec::new();
        let mut current = id;
        loop {
            let node = &self.nodes[current as usize];
            let Some(character) = node.character else {
                break;
            };
            labels.push(character);
            if Alphabet::is_codepoint_boundary(character) {
                break;
            }
            match node.parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        labels.reverse();
        (labels, current)
    }

    /// Path length from the root.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = id;
        while let Some(parent) = self.nodes[current as usize].parent {
            depth += 1;
            current = parent;
        }
        depth
    }
}
