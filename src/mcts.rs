//! Generic Monte Carlo Tree Search over an arena of nodes.
//!
//! The search knows nothing about the game. Everything game-specific comes
//! through the [`SearchGame`] trait: state transitions, action generation,
//! terminal detection, and the "is this a win for the player who moved
//! here" predicate used in backpropagation. Tree policy, default policy,
//! extension gating, garbage-collection gating and the final root choice
//! have default implementations that a game may override.
//!
//! Each iteration:
//! - descends from the root, bumping visit counts, choosing children by the
//!   tree policy at decision nodes and by weighted sampling at chance nodes;
//! - expands one new child at the first node with an untried action;
//! - plays a rollout from the new child with the default policy;
//! - credits a win to every node on the path whose mover won.
//!
//! Nodes live in a fixed-capacity [`Arena`]. When it fills up, subtrees that
//! were rarely visited may be collected; otherwise the search stops early
//! and answers with what it has.

use std::time::{Duration, Instant};

use fastrand::Rng;
use tracing::{debug, warn};

use crate::arena::{Arena, NodeId};
use crate::config::SearchConfig;
use crate::playout::rollout;

/// UCB1: `avg + c * sqrt(2 ln(parent) / child)`.
#[inline]
pub fn ucb1(average_reward: f64, parent_visits: f64, child_visits: f64, c: f64) -> f64 {
    average_reward + c * (2.0 * parent_visits.max(1.0).ln() / child_visits.max(1.0)).sqrt()
}

/// Draw an index with probability proportional to `weights`, which must sum
/// to `total > 0`.
pub fn weighted_index<I: IntoIterator<Item = u32>>(weights: I, total: u32, rng: &mut Rng) -> usize {
    let mut r = rng.u32(..total);
    let mut last = 0;
    for (i, w) in weights.into_iter().enumerate() {
        if r < w {
            return i;
        }
        r -= w;
        last = i;
    }
    last
}

/// The capabilities a game supplies to the search.
pub trait SearchGame {
    type State: Clone;
    type Action: Clone;
    type Outcome: Copy;

    /// State reached by playing `action` in `state`.
    fn next_state(&self, state: &Self::State, action: &Self::Action) -> Self::State;

    /// Append the legal actions of a non-terminal `state` with their weights.
    fn make_actions(&self, state: &Self::State, actions: &mut Vec<(Self::Action, u32)>);

    /// `Some` for terminal states.
    fn outcome(&self, state: &Self::State) -> Option<Self::Outcome>;

    /// Whether the environment, not a player, picks the next action.
    fn is_chance(&self, state: &Self::State) -> bool;

    /// Whether `outcome` counts as a win for the player who moved into `state`.
    fn is_win(&self, state: &Self::State, outcome: &Self::Outcome) -> bool;

    /// Score used to pick a child during selection; the highest wins.
    fn tree_policy_value(&self, parent: &SearchNode<Self>, child: &SearchNode<Self>, c: f64) -> f64 {
        ucb1(
            child.average_reward(),
            parent.visits() as f64,
            child.visits() as f64,
            c,
        )
    }

    /// Action picked during rollouts: uniform, or weighted if weights differ.
    fn default_policy(&self, actions: &[(Self::Action, u32)], rng: &mut Rng) -> usize {
        assert!(!actions.is_empty(), "empty action set during rollout");
        let first = actions[0].1;
        if actions.iter().all(|(_, w)| *w == first) {
            rng.usize(..actions.len())
        } else {
            let total = actions.iter().map(|(_, w)| *w).sum();
            weighted_index(actions.iter().map(|(_, w)| *w), total, rng)
        }
    }

    /// Whether `node` may grow new children.
    fn allow_extend(&self, _node: &SearchNode<Self>) -> bool {
        true
    }

    /// Whether the subtree under `node` may be collected.
    fn allow_gc(&self, node: &SearchNode<Self>, threshold: u32) -> bool {
        node.visits() < threshold
    }

    /// Score of a root child when choosing the final action.
    fn root_value(&self, node: &SearchNode<Self>) -> f64 {
        node.visits() as f64
    }
}

/// A node of the search tree.
pub struct SearchNode<G: SearchGame + ?Sized> {
    state: G::State,
    outcome: Option<G::Outcome>,
    chance: bool,
    visits: u32,
    wins: u32,
    actions: Vec<(G::Action, u32)>,
    children: Vec<Option<NodeId>>,
    /// Cursor into `actions`: everything before it has been tried.
    next_action: usize,
    /// Tried indices whose child was collected and may be expanded again.
    reclaimed: Vec<usize>,
}

impl<G: SearchGame + ?Sized> SearchNode<G> {
    pub fn new(game: &G, state: G::State) -> Self {
        let outcome = game.outcome(&state);
        let mut actions = Vec::new();
        let mut chance = false;
        if outcome.is_none() {
            game.make_actions(&state, &mut actions);
            chance = game.is_chance(&state);
        }
        let children = vec![None; actions.len()];
        Self {
            state,
            outcome,
            chance,
            visits: 0,
            wins: 0,
            actions,
            children,
            next_action: 0,
            reclaimed: Vec::new(),
        }
    }

    #[inline]
    pub fn state(&self) -> &G::State {
        &self.state
    }

    #[inline]
    pub fn outcome(&self) -> Option<&G::Outcome> {
        self.outcome.as_ref()
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some()
    }

    #[inline]
    pub fn is_chance(&self) -> bool {
        self.chance
    }

    #[inline]
    pub fn visits(&self) -> u32 {
        self.visits
    }

    #[inline]
    pub fn wins(&self) -> u32 {
        self.wins
    }

    pub fn average_reward(&self) -> f64 {
        if self.visits == 0 {
            0.0
        } else {
            self.wins as f64 / self.visits as f64
        }
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    pub fn action(&self, index: usize) -> &G::Action {
        &self.actions[index].0
    }

    pub fn child(&self, index: usize) -> Option<NodeId> {
        self.children[index]
    }

    fn next_unexpanded(&self) -> Option<usize> {
        if self.next_action < self.actions.len() {
            Some(self.next_action)
        } else {
            self.reclaimed.last().copied()
        }
    }

    fn attach(&mut self, index: usize, child: NodeId) {
        self.children[index] = Some(child);
        if index == self.next_action {
            self.next_action += 1;
        } else {
            self.reclaimed.retain(|&i| i != index);
        }
    }
}

/// Why the search loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Iterations,
    Timeout,
    OutOfMemory,
}

/// Statistics of one root child.
#[derive(Debug, Clone)]
pub struct ChildStats<A> {
    pub action: A,
    pub visits: u32,
    pub wins: u32,
}

/// Result of a search.
#[derive(Debug, Clone)]
pub struct SearchReport<A> {
    pub action: A,
    pub iterations: usize,
    pub nodes: usize,
    pub elapsed: Duration,
    pub stop: StopReason,
    /// Rollouts that hit the action limit and credited nobody.
    pub aborted_rollouts: usize,
    /// One entry per materialised root child, in action order.
    pub children: Vec<ChildStats<A>>,
}

impl<A> SearchReport<A> {
    /// Win rate of the chosen child, if it was visited.
    pub fn winrate(&self) -> Option<f64>
    where
        A: PartialEq,
    {
        self.children
            .iter()
            .find(|c| c.action == self.action && c.visits > 0)
            .map(|c| c.wins as f64 / c.visits as f64)
    }
}

/// Monte Carlo Tree Search engine.
pub struct MctsSearch<G: SearchGame> {
    game: G,
    arena: Arena<SearchNode<G>>,
    config: SearchConfig,
    rng: Rng,
    aborted: usize,
}

impl<G: SearchGame> MctsSearch<G> {
    pub fn new(game: G, config: SearchConfig) -> Self {
        let rng = config.rng();
        Self {
            game,
            arena: Arena::new(config.max_nodes),
            config,
            rng,
            aborted: 0,
        }
    }

    fn node(&self, id: NodeId) -> &SearchNode<G> {
        self.arena
            .get(id)
            .unwrap_or_else(|| panic!("stale node handle {id:?} in search tree"))
    }

    fn node_mut(&mut self, id: NodeId) -> &mut SearchNode<G> {
        self.arena
            .get_mut(id)
            .unwrap_or_else(|| panic!("stale node handle {id:?} in search tree"))
    }

    /// Search from `root_state` within the configured budget and pick an action.
    ///
    /// Panics if the root is terminal, or if no root child was materialised
    /// for a decision root.
    pub fn search(&mut self, root_state: G::State) -> SearchReport<G::Action> {
        self.arena.clear();
        self.aborted = 0;
        let root_node = SearchNode::new(&self.game, root_state);
        assert!(!root_node.is_terminal(), "search started from a terminal state");
        let Some(root) = self.arena.construct(root_node) else {
            panic!("arena too small to hold the root node");
        };

        let start = Instant::now();
        let mut iterations = 0;
        let mut stop = StopReason::Iterations;
        while iterations < self.config.max_iteration {
            if start.elapsed() >= self.config.timeout {
                stop = StopReason::Timeout;
                break;
            }
            if self.arena.is_full() {
                if self.config.enable_gc {
                    let freed = self.collect_garbage(root);
                    debug!(freed, nodes = self.arena.len(), "garbage collected");
                }
                if self.arena.is_full() {
                    warn!(iterations, nodes = self.arena.len(), "node pool exhausted, stopping search");
                    stop = StopReason::OutOfMemory;
                    break;
                }
            }
            self.iterate(root);
            iterations += 1;
        }

        let action = self.best_action(root);
        let root_node = self.node(root);
        let children = (0..root_node.action_count())
            .filter_map(|i| {
                let child = self.arena.get(root_node.child(i)?)?;
                Some(ChildStats {
                    action: root_node.action(i).clone(),
                    visits: child.visits(),
                    wins: child.wins(),
                })
            })
            .collect();
        let report = SearchReport {
            action,
            iterations,
            nodes: self.arena.len(),
            elapsed: start.elapsed(),
            stop,
            aborted_rollouts: self.aborted,
            children,
        };
        debug!(
            iterations = report.iterations,
            nodes = report.nodes,
            elapsed_ms = report.elapsed.as_millis() as u64,
            stop = ?report.stop,
            aborted_rollouts = report.aborted_rollouts,
            "search finished"
        );
        report
    }

    /// One selection, expansion, simulation and backpropagation pass.
    fn iterate(&mut self, root: NodeId) {
        let mut path = Vec::with_capacity(64);
        let outcome = self.tree_descend(root, &mut path);
        self.tree_update(&path, outcome.as_ref());
    }

    /// Walk down from `root` to the point of expansion and return the
    /// outcome of the rollout played there. `path` receives every node
    /// visited, including a newly created child.
    fn tree_descend(&mut self, root: NodeId, path: &mut Vec<NodeId>) -> Option<G::Outcome> {
        let mut id = root;
        loop {
            path.push(id);
            let (outcome, chance) = {
                let node = self.node_mut(id);
                node.visits += 1;
                (node.outcome, node.chance)
            };
            if outcome.is_some() {
                return outcome;
            }

            if chance {
                let index = self.sample_action(id);
                match self.live_child(id, index) {
                    Some(child) => {
                        id = child;
                        continue;
                    }
                    None => return self.expand(id, index, path),
                }
            }

            let node = self.node(id);
            if self.game.allow_extend(node) {
                if let Some(index) = node.next_unexpanded() {
                    return self.expand(id, index, path);
                }
            }
            match self.most_urgent(id) {
                Some(child) => id = child,
                None => {
                    let state = self.node(id).state.clone();
                    return self.simulate(&state);
                }
            }
        }
    }

    /// Sample an action index of `id` by weight.
    fn sample_action(&mut self, id: NodeId) -> usize {
        let Some(node) = self.arena.get(id) else {
            panic!("stale node handle {id:?} in search tree");
        };
        let total = node.actions.iter().map(|(_, w)| *w).sum();
        weighted_index(node.actions.iter().map(|(_, w)| *w), total, &mut self.rng)
    }

    fn live_child(&self, parent: NodeId, index: usize) -> Option<NodeId> {
        self.node(parent).children[index].filter(|&c| self.arena.contains(c))
    }

    /// Materialise the child for action `index` of `parent` and roll out from it.
    fn expand(&mut self, parent: NodeId, index: usize, path: &mut Vec<NodeId>) -> Option<G::Outcome> {
        let state = {
            let node = self.node(parent);
            self.game.next_state(&node.state, &node.actions[index].0)
        };
        let mut child = SearchNode::new(&self.game, state);
        let outcome = match child.outcome {
            Some(outcome) => Some(outcome),
            None => self.simulate(&child.state),
        };
        child.visits = 1;
        match self.arena.construct(child) {
            Some(child_id) => {
                self.node_mut(parent).attach(index, child_id);
                path.push(child_id);
            }
            None => debug!("node pool full, rollout not stored"),
        }
        outcome
    }

    /// Roll out from `state`, counting rollouts cut off by the action limit.
    fn simulate(&mut self, state: &G::State) -> Option<G::Outcome> {
        let outcome = rollout(&self.game, state, self.config.rollout_limit, &mut self.rng);
        if outcome.is_none() {
            self.aborted += 1;
        }
        outcome
    }

    /// Materialised child with the highest tree-policy value; first on ties.
    fn most_urgent(&self, parent: NodeId) -> Option<NodeId> {
        let node = self.node(parent);
        let mut best: Option<(NodeId, f64)> = None;
        for child_id in node.children.iter().flatten() {
            let Some(child) = self.arena.get(*child_id) else {
                continue;
            };
            let value = self.game.tree_policy_value(node, child, self.config.ucb_c);
            if best.is_none_or(|(_, b)| value > b) {
                best = Some((*child_id, value));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Credit the outcome along `path`.
    fn tree_update(&mut self, path: &[NodeId], outcome: Option<&G::Outcome>) {
        let Some(outcome) = outcome else {
            return;
        };
        for &id in path {
            let game = &self.game;
            if let Some(node) = self.arena.get_mut(id) {
                if game.is_win(&node.state, outcome) {
                    node.wins += 1;
                }
            }
        }
    }

    /// Pick the root child with the highest root value.
    fn best_action(&mut self, root: NodeId) -> G::Action {
        let node = self.node(root);
        let mut best: Option<(usize, f64)> = None;
        for (i, child_id) in node.children.iter().enumerate() {
            let Some(child) = child_id.and_then(|c| self.arena.get(c)) else {
                continue;
            };
            let value = self.game.root_value(child);
            if best.is_none_or(|(_, b)| value > b) {
                best = Some((i, value));
            }
        }
        let chance = node.chance;
        let index = match best {
            Some((i, _)) => i,
            None if chance => self.sample_action(root),
            None => panic!("root node has no materialised child"),
        };
        self.node(root).actions[index].0.clone()
    }

    /// Free lightly visited subtrees below the root's children. Returns the
    /// number of nodes released.
    fn collect_garbage(&mut self, root: NodeId) -> usize {
        let threshold = self.config.gc_visit_threshold;
        let mut freed = 0;
        let mut stack: Vec<NodeId> = self.node(root).children.iter().flatten().copied().collect();
        while let Some(id) = stack.pop() {
            let children: Vec<(usize, NodeId)> = match self.arena.get(id) {
                Some(node) => node
                    .children
                    .iter()
                    .enumerate()
                    .filter_map(|(i, c)| c.map(|c| (i, c)))
                    .collect(),
                None => continue,
            };
            for (index, child_id) in children {
                let collectable = match self.arena.get(child_id) {
                    Some(child) => self.game.allow_gc(child, threshold),
                    None => true,
                };
                if collectable {
                    freed += self.free_subtree(child_id);
                    let parent = self.node_mut(id);
                    parent.children[index] = None;
                    if !parent.chance {
                        parent.reclaimed.push(index);
                    }
                } else {
                    stack.push(child_id);
                }
            }
        }
        freed
    }

    /// Free `id` and everything below it, children first.
    fn free_subtree(&mut self, id: NodeId) -> usize {
        let children: Vec<NodeId> = match self.arena.get(id) {
            Some(node) => node.children.iter().flatten().copied().collect(),
            None => return 0,
        };
        let mut freed = 0;
        for child in children {
            freed += self.free_subtree(child);
        }
        if self.arena.free(id) {
            freed += 1;
        }
        freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Take 1 or 2 from a pile; whoever takes the last stone wins.
    struct Nim;

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Pile {
        stones: u32,
        to_move: u8,
    }

    impl SearchGame for Nim {
        type State = Pile;
        type Action = u32;
        type Outcome = u8;

        fn next_state(&self, state: &Pile, take: &u32) -> Pile {
            Pile {
                stones: state.stones - take,
                to_move: 1 - state.to_move,
            }
        }

        fn make_actions(&self, state: &Pile, actions: &mut Vec<(u32, u32)>) {
            for take in 1..=state.stones.min(2) {
                actions.push((take, 1));
            }
        }

        fn outcome(&self, state: &Pile) -> Option<u8> {
            (state.stones == 0).then_some(1 - state.to_move)
        }

        fn is_chance(&self, _state: &Pile) -> bool {
            false
        }

        fn is_win(&self, state: &Pile, winner: &u8) -> bool {
            *winner == 1 - state.to_move
        }
    }

    /// Pick one of two bets, then a weighted coin settles it: bet 0 wins
    /// 9 times in 10, bet 1 wins 1 time in 5.
    struct Gamble;

    #[derive(Clone, Copy, Debug, PartialEq)]
    enum Bet {
        Open,
        Pending(usize),
        Settled(bool),
    }

    impl SearchGame for Gamble {
        type State = Bet;
        type Action = usize;
        type Outcome = bool;

        fn next_state(&self, state: &Bet, action: &usize) -> Bet {
            match state {
                Bet::Open => Bet::Pending(*action),
                _ => Bet::Settled(*action == 1),
            }
        }

        fn make_actions(&self, state: &Bet, actions: &mut Vec<(usize, u32)>) {
            match state {
                Bet::Open => actions.extend([(0, 1), (1, 1)]),
                Bet::Pending(0) => actions.extend([(1, 9), (0, 1)]),
                Bet::Pending(_) => actions.extend([(1, 1), (0, 4)]),
                Bet::Settled(_) => {}
            }
        }

        fn outcome(&self, state: &Bet) -> Option<bool> {
            match state {
                Bet::Settled(won) => Some(*won),
                _ => None,
            }
        }

        fn is_chance(&self, state: &Bet) -> bool {
            matches!(state, Bet::Pending(_))
        }

        fn is_win(&self, state: &Bet, won: &bool) -> bool {
            *state != Bet::Open && *won
        }
    }

    fn config(iterations: usize, nodes: usize) -> SearchConfig {
        SearchConfig {
            max_iteration: iterations,
            timeout: Duration::from_secs(60),
            max_nodes: nodes,
            seed: Some(1),
            ..SearchConfig::default()
        }
    }

    #[test]
    fn test_ucb1_prefers_unexplored() {
        assert!(ucb1(0.5, 100.0, 1.0, 1.0) > ucb1(0.5, 100.0, 50.0, 1.0));
        assert!(ucb1(0.9, 100.0, 10.0, 1.0) > ucb1(0.1, 100.0, 10.0, 1.0));
    }

    #[test]
    fn test_finds_winning_nim_move() {
        // From 4 stones, taking 1 leaves the opponent a losing pile of 3.
        let mut search = MctsSearch::new(Nim, config(2000, 10_000));
        let report = search.search(Pile { stones: 4, to_move: 0 });
        assert_eq!(report.action, 1);
        assert_eq!(report.stop, StopReason::Iterations);
        assert_eq!(report.iterations, 2000);
        assert_eq!(report.aborted_rollouts, 0);
    }

    #[test]
    fn test_aborted_rollouts_counted() {
        let mut search = MctsSearch::new(Nim, SearchConfig {
            rollout_limit: 0,
            ..config(50, 1000)
        });
        let report = search.search(Pile { stones: 20, to_move: 0 });
        // No rollout can reach the end of a 20-stone pile.
        assert_eq!(report.aborted_rollouts, 50);
        assert!(report.children.iter().all(|c| c.wins == 0));

        // The count starts over with every search.
        let again = search.search(Pile { stones: 20, to_move: 0 });
        assert_eq!(again.aborted_rollouts, 50);
    }

    #[test]
    fn test_chance_nodes_sample_by_weight() {
        let mut search = MctsSearch::new(Gamble, SearchConfig {
            ucb_c: 10.0,
            ..config(5000, 1000)
        });
        let report = search.search(Bet::Open);
        assert_eq!(report.action, 0);
        assert_eq!(report.children.len(), 2);
        let rates: Vec<f64> = report
            .children
            .iter()
            .map(|c| c.wins as f64 / c.visits as f64)
            .collect();
        assert!((rates[0] - 0.9).abs() < 0.05, "bet 0 won {}", rates[0]);
        assert!((rates[1] - 0.2).abs() < 0.05, "bet 1 won {}", rates[1]);
        assert!((report.winrate().unwrap() - rates[0]).abs() < 1e-12);
    }

    #[test]
    fn test_chance_root_picks_likely_outcome() {
        let mut search = MctsSearch::new(Gamble, config(1000, 100));
        let report = search.search(Bet::Pending(0));
        assert_eq!(report.action, 1);
        let total: u32 = report.children.iter().map(|c| c.visits).sum();
        assert_eq!(total, 1000);
    }

    #[test]
    fn test_each_action_expanded_once() {
        let mut search = MctsSearch::new(Nim, config(2, 100));
        let report = search.search(Pile { stones: 5, to_move: 0 });
        assert_eq!(report.children.len(), 2);
        assert!(report.children.iter().all(|c| c.visits == 1));
    }

    #[test]
    fn test_stops_when_pool_exhausted() {
        let mut search = MctsSearch::new(Nim, SearchConfig {
            enable_gc: false,
            ..config(1000, 5)
        });
        let report = search.search(Pile { stones: 10, to_move: 0 });
        assert_eq!(report.stop, StopReason::OutOfMemory);
        assert!(report.iterations < 1000);
        assert_eq!(report.nodes, 5);
    }

    #[test]
    fn test_gc_keeps_search_running() {
        let mut search = MctsSearch::new(Nim, SearchConfig {
            enable_gc: true,
            gc_visit_threshold: 1_000_000,
            ..config(500, 20)
        });
        let report = search.search(Pile { stones: 12, to_move: 0 });
        assert_eq!(report.stop, StopReason::Iterations);
        assert_eq!(report.children.len(), 2);
    }

    #[test]
    #[should_panic(expected = "no materialised child")]
    fn test_zero_budget_panics() {
        let mut search = MctsSearch::new(Nim, config(0, 100));
        search.search(Pile { stones: 5, to_move: 0 });
    }

    #[test]
    fn test_weighted_index_bounds() {
        let mut rng = Rng::with_seed(3);
        for _ in 0..100 {
            let i = weighted_index([0, 5, 0, 1], 6, &mut rng);
            assert!(i == 1 || i == 3);
        }
    }
}
