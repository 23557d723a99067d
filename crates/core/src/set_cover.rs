//! Weighted set-cover solver for substemma optimization.
//!
//! The problem: cover a target bitmap (a witness's extant passages) with a
//! subset of rows (its potential ancestors' explained-passage bitmaps)
//! minimizing total cost. Rows are expected pre-sorted by ascending cost,
//! then descending agreements.
//!
//! The solver first fixes every row that uniquely covers some target
//! column (such rows appear in every feasible solution), reduces the
//! target accordingly, then runs depth-first branch and bound over the
//! remaining rows with an explicit accept/reject node stack. When no fixed
//! upper bound is supplied, the bound is seeded from the cheapest
//! single-row cover and a redundancy-pruned greedy cover, and the final
//! result retains every minimum-cost solution; with a fixed bound, all
//! solutions within the bound are enumerated.

use std::time::Instant;

use roaring::RoaringBitmap;

/// Cost-comparison slack for accumulated floating-point costs.
const COST_EPS: f64 = 1e-9;

/// One candidate row: a potential ancestor's coverage and cost.
#[derive(Debug, Clone)]
pub struct SetCoverRow {
    pub id: String,
    /// Target columns this row covers (explained passages).
    pub covered: RoaringBitmap,
    /// Passages where the row's witness agrees with the target witness.
    pub agreements: RoaringBitmap,
    pub cost: f64,
}

/// A feasible cover: row IDs, total cost, and the cardinality of the
/// union of the rows' agreement bitmaps.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SetCoverSolution {
    pub rows: Vec<String>,
    pub cost: f64,
    pub agreements: u64,
}

/// The outcome of a solver run.
///
/// An infeasible target yields an empty solution list with the uncovered
/// columns recorded as a diagnostic; a deadline expiry yields whatever
/// solutions had been found with `truncated` set.
#[derive(Debug, Clone, Default)]
pub struct SetCoverOutcome {
    pub solutions: Vec<SetCoverSolution>,
    pub uncovered: RoaringBitmap,
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodePhase {
    Accept,
    Reject,
    Done,
}

/// A branch-and-bound stack node: which row to decide, and how far the
/// accept/reject/restore cycle has progressed.
#[derive(Debug, Clone, Copy)]
struct BranchNode {
    candidate_row: u32,
    phase: NodePhase,
}

/// Weighted set-cover solver over a fixed row table.
#[derive(Debug)]
pub struct SetCoverSolver<'a> {
    rows: &'a [SetCoverRow],
    target: RoaringBitmap,
    fixed_ub: Option<f64>,
    deadline: Option<Instant>,
}

impl<'a> SetCoverSolver<'a> {
    /// `rows` must be sorted by ascending cost, then descending agreements.
    #[must_use]
    pub fn new(
        rows: &'a [SetCoverRow],
        target: RoaringBitmap,
        fixed_ub: Option<f64>,
        deadline: Option<Instant>,
    ) -> Self {
        Self {
            rows,
            target,
            fixed_ub,
            deadline,
        }
    }

    /// Solves the cover problem.
    #[must_use]
    pub fn solve(&self) -> SetCoverOutcome {
        // Any column no row covers makes the problem infeasible outright.
        let mut row_union = RoaringBitmap::new();
        for row in self.rows {
            row_union |= &row.covered;
        }
        let uncovered = &self.target - &row_union;
        if !uncovered.is_empty() {
            tracing::debug!(
                uncovered = uncovered.len(),
                "set cover target is infeasible"
            );
            return SetCoverOutcome {
                solutions: Vec::new(),
                uncovered,
                truncated: false,
            };
        }

        // Rows that uniquely cover a column appear in every solution; fix
        // them and reduce the problem.
        let unique_rows = self.unique_rows();
        let mut subproblem_target = self.target.clone();
        let mut unique_cost = 0.0;
        for &row_index in &unique_rows {
            subproblem_target -= &self.rows[row_index].covered;
            unique_cost += self.rows[row_index].cost;
        }
        if let Some(ub) = self.fixed_ub {
            if unique_cost > ub + COST_EPS {
                return SetCoverOutcome::default();
            }
        }
        if subproblem_target.is_empty() {
            let solution = self.assemble(&unique_rows, &[]);
            return SetCoverOutcome {
                solutions: vec![solution],
                uncovered: RoaringBitmap::new(),
                truncated: false,
            };
        }

        // The unique rows no longer overlap the reduced target, so only the
        // other rows participate in the search.
        let subproblem_rows: Vec<usize> = (0..self.rows.len())
            .filter(|&i| !(&self.rows[i].covered & &subproblem_target).is_empty())
            .collect();
        let subproblem_ub = self.fixed_ub.map(|ub| ub - unique_cost);
        let (branch_solutions, truncated) =
            self.branch_and_bound(&subproblem_rows, &subproblem_target, subproblem_ub);

        let mut solutions: Vec<SetCoverSolution> = branch_solutions
            .iter()
            .map(|subset| self.assemble(&unique_rows, &subset.0))
            .collect();
        if self.fixed_ub.is_none() {
            let minimum = solutions
                .iter()
                .map(|s| s.cost)
                .fold(f64::INFINITY, f64::min);
            solutions.retain(|s| s.cost <= minimum + COST_EPS);
        }
        solutions.sort_by(|s1, s2| {
            s1.cost
                .partial_cmp(&s2.cost)
                .unwrap_or(core::cmp::Ordering::Equal)
                .then_with(|| s1.rows.len().cmp(&s2.rows.len()))
                // Lexicographic over the row ID sets; the stored order
                // (unique rows first) is display order, not identity.
                .then_with(|| {
                    let mut ids1: Vec<&str> = s1.rows.iter().map(String::as_str).collect();
                    let mut ids2: Vec<&str> = s2.rows.iter().map(String::as_str).collect();
                    ids1.sort_unstable();
                    ids2.sort_unstable();
                    ids1.cmp(&ids2)
                })
        });
        SetCoverOutcome {
            solutions,
            uncovered: RoaringBitmap::new(),
            truncated,
        }
    }

    /// Indices of rows that uniquely cover at least one target column.
    ///
    /// Walks a binary tree of bitwise ORs over the row bitmaps: a column
    /// contained in only one child at every level is covered by exactly one
    /// row.
    fn unique_rows(&self) -> Vec<usize> {
        let n = self.rows.len();
        if n == 0 {
            return Vec::new();
        }
        let mut union_tree: Vec<RoaringBitmap> = vec![RoaringBitmap::new(); 2 * n - 1];
        for i in 0..n {
            union_tree[n - 1 + i] = self.rows[i].covered.clone();
        }
        for i in (0..n.saturating_sub(1)).rev() {
            union_tree[i] = &union_tree[2 * i + 1] | &union_tree[2 * i + 2];
        }
        let mut unique = RoaringBitmap::new();
        for column in &self.target {
            let mut p = 0usize;
            while p < n - 1 {
                let left = &union_tree[2 * p + 1];
                let right = &union_tree[2 * p + 2];
                match (left.contains(column), right.contains(column)) {
                    (true, true) | (false, false) => break,
                    (true, false) => p = 2 * p + 1,
                    (false, true) => p = 2 * p + 2,
                }
            }
            if p >= n - 1 {
                unique.insert(u32::try_from(p - (n - 1)).expect("row index fits in u32"));
            }
        }
        unique.iter().map(|i| i as usize).collect()
    }

    /// Cheapest single row covering the whole target, if any.
    fn trivial_solution(&self, target: &RoaringBitmap, rows: &[usize]) -> Option<f64> {
        rows.iter()
            .filter(|&&i| target.is_subset(&self.rows[i].covered))
            .map(|&i| self.rows[i].cost)
            .fold(None, |best, cost| match best {
                Some(b) if b <= cost => Some(b),
                _ => Some(cost),
            })
    }

    /// Greedy cover by minimum cost density, then redundancy-pruned from the
    /// most expensive row downward.
    fn greedy_solution(&self, target: &RoaringBitmap, rows: &[usize]) -> f64 {
        let mut chosen: Vec<usize> = Vec::new();
        let mut uncovered = target.clone();
        while !uncovered.is_empty() {
            let mut best_density = f64::INFINITY;
            let mut best_row: Option<usize> = None;
            for &i in rows {
                if chosen.contains(&i) {
                    continue;
                }
                let coverage = (&self.rows[i].covered & &uncovered).len();
                if coverage == 0 {
                    continue;
                }
                #[allow(clippy::cast_precision_loss)]
                let density = self.rows[i].cost / coverage as f64;
                if density < best_density {
                    best_density = density;
                    best_row = Some(i);
                }
            }
            let Some(i) = best_row else { break };
            uncovered -= &self.rows[i].covered;
            chosen.push(i);
        }
        // Drop redundant rows, most expensive (highest index) first.
        chosen.sort_unstable();
        let mut kept = chosen.clone();
        for &i in chosen.iter().rev() {
            let mut union = RoaringBitmap::new();
            for &j in kept.iter().filter(|&&j| j != i) {
                union |= &self.rows[j].covered;
            }
            if target.is_subset(&union) {
                kept.retain(|&j| j != i);
            }
        }
        kept.iter().map(|&i| self.rows[i].cost).sum()
    }

    /// Depth-first branch and bound over `rows` (indices into the full row
    /// table), returning accepted index subsets and their costs.
    fn branch_and_bound(
        &self,
        rows: &[usize],
        target: &RoaringBitmap,
        fixed_ub: Option<f64>,
    ) -> (Vec<(Vec<usize>, f64)>, bool) {
        let n = u32::try_from(rows.len()).expect("row count fits in u32");
        let mut ub = fixed_ub.unwrap_or_else(|| {
            let greedy = self.greedy_solution(target, rows);
            self.trivial_solution(target, rows)
                .map_or(greedy, |trivial| trivial.min(greedy))
        });

        let mut accepted = RoaringBitmap::new();
        let mut remaining = RoaringBitmap::new();
        remaining.insert_range(0..n);
        let mut stack: Vec<BranchNode> = Vec::new();
        let mut solutions: Vec<(Vec<usize>, f64)> = Vec::new();
        let mut truncated = false;

        let Some(first) = remaining.min() else {
            return (solutions, truncated);
        };
        stack.push(BranchNode {
            candidate_row: first,
            phase: NodePhase::Accept,
        });

        while let Some(node) = stack.last_mut() {
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline {
                    tracing::warn!("set cover solver deadline reached; truncating search");
                    truncated = true;
                    break;
                }
            }
            let candidate = node.candidate_row;
            match node.phase {
                NodePhase::Accept => {
                    remaining.remove(candidate);
                    accepted.insert(candidate);
                    node.phase = NodePhase::Reject;
                }
                NodePhase::Reject => {
                    accepted.remove(candidate);
                    node.phase = NodePhase::Done;
                }
                NodePhase::Done => {
                    remaining.insert(candidate);
                    stack.pop();
                    continue;
                }
            }

            let lb: f64 = accepted
                .iter()
                .map(|i| self.rows[rows[i as usize]].cost)
                .sum();
            if self.covers(&accepted, rows, target) {
                if lb <= ub + COST_EPS {
                    if fixed_ub.is_none() {
                        ub = ub.min(lb);
                    }
                    let subset: Vec<usize> =
                        accepted.iter().map(|i| rows[i as usize]).collect();
                    solutions.push((subset, lb));
                }
            } else if lb <= ub + COST_EPS {
                let in_branch = &accepted | &remaining;
                if self.covers(&in_branch, rows, target) {
                    let next = remaining.min().expect("branchable node has remaining rows");
                    stack.push(BranchNode {
                        candidate_row: next,
                        phase: NodePhase::Accept,
                    });
                }
            }
        }
        (solutions, truncated)
    }

    fn covers(&self, subset: &RoaringBitmap, rows: &[usize], target: &RoaringBitmap) -> bool {
        let mut union = RoaringBitmap::new();
        for i in subset {
            union |= &self.rows[rows[i as usize]].covered;
            if target.is_subset(&union) {
                return true;
            }
        }
        target.is_subset(&union)
    }

    /// Builds a solution from fixed unique rows plus a branch subset.
    fn assemble(&self, unique_rows: &[usize], subset: &[usize]) -> SetCoverSolution {
        let mut indices: Vec<usize> = unique_rows.to_vec();
        indices.extend_from_slice(subset);
        let mut agreements = RoaringBitmap::new();
        let mut cost = 0.0;
        let mut ids = Vec::with_capacity(indices.len());
        for &i in &indices {
            agreements |= &self.rows[i].agreements;
            cost += self.rows[i].cost;
            ids.push(self.rows[i].id.clone());
        }
        SetCoverSolution {
            rows: ids,
            cost,
            agreements: agreements.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitmap(values: &[u32]) -> RoaringBitmap {
        values.iter().copied().collect()
    }

    fn row(id: &str, covered: &[u32], cost: f64) -> SetCoverRow {
        SetCoverRow {
            id: id.to_owned(),
            covered: bitmap(covered),
            agreements: bitmap(covered),
            cost,
        }
    }

    #[test]
    fn single_covering_row_is_optimal() {
        // A covers {0,2,3} at 3, B covers {0,3} at 2, C covers all at 4.
        let rows = vec![
            row("B", &[0, 3], 2.0),
            row("A", &[0, 2, 3], 3.0),
            row("C", &[0, 1, 2, 3], 4.0),
        ];
        let target = bitmap(&[0, 1, 2, 3]);
        let solver = SetCoverSolver::new(&rows, target.clone(), None, None);

        let all: Vec<usize> = (0..rows.len()).collect();
        assert_eq!(solver.trivial_solution(&target, &all), Some(4.0));

        let outcome = solver.solve();
        assert!(!outcome.truncated);
        assert_eq!(outcome.solutions.len(), 1);
        assert_eq!(outcome.solutions[0].rows, ["C"]);
        assert_eq!(outcome.solutions[0].cost, 4.0);
    }

    #[test]
    fn unique_rows_are_fixed_before_search() {
        // Column 1 is covered only by D; with D fixed, B finishes the cover
        // cheaper than A.
        let rows = vec![
            row("D", &[1, 2, 3], 1.0),
            row("B", &[0, 3], 2.0),
            row("A", &[0, 2, 3], 3.0),
        ];
        let target = bitmap(&[0, 1, 2, 3]);
        let solver = SetCoverSolver::new(&rows, target, None, None);
        assert_eq!(solver.unique_rows(), vec![0]);

        let outcome = solver.solve();
        assert_eq!(outcome.solutions.len(), 1);
        assert_eq!(outcome.solutions[0].rows, ["D", "B"]);
        assert_eq!(outcome.solutions[0].cost, 3.0);
    }

    #[test]
    fn infeasible_target_reports_uncovered_columns() {
        let rows = vec![row("A", &[0, 1], 1.0)];
        let target = bitmap(&[0, 1, 5]);
        let outcome = SetCoverSolver::new(&rows, target, None, None).solve();
        assert!(outcome.solutions.is_empty());
        assert_eq!(outcome.uncovered, bitmap(&[5]));
    }

    #[test]
    fn empty_target_yields_empty_solution() {
        let rows = vec![row("A", &[0], 1.0)];
        let outcome = SetCoverSolver::new(&rows, RoaringBitmap::new(), None, None).solve();
        assert_eq!(outcome.solutions.len(), 1);
        assert!(outcome.solutions[0].rows.is_empty());
        assert_eq!(outcome.solutions[0].cost, 0.0);
    }

    #[test]
    fn fixed_bound_enumerates_within_bound() {
        let rows = vec![
            row("B", &[0, 1], 1.0),
            row("A", &[0, 1], 2.0),
            row("C", &[1], 5.0),
        ];
        let target = bitmap(&[0, 1]);
        let outcome = SetCoverSolver::new(&rows, target, Some(2.5), None).solve();
        let found: Vec<&[String]> = outcome.solutions.iter().map(|s| &s.rows[..]).collect();
        assert!(found.contains(&&["B".to_owned()][..]));
        assert!(found.contains(&&["A".to_owned()][..]));
        // B+A costs 3.0 and is excluded by the bound; C never covers alone.
        assert_eq!(outcome.solutions.len(), 2);
    }

    #[test]
    fn all_minimum_cost_solutions_are_retained() {
        let rows = vec![row("A", &[0, 1], 2.0), row("B", &[0, 1], 2.0)];
        let target = bitmap(&[0, 1]);
        let outcome = SetCoverSolver::new(&rows, target, None, None).solve();
        assert_eq!(outcome.solutions.len(), 2);
        // Deterministic ordering: same cost and size, lexicographic by IDs.
        assert_eq!(outcome.solutions[0].rows, ["A"]);
        assert_eq!(outcome.solutions[1].rows, ["B"]);
    }

    #[test]
    fn tied_solutions_order_by_sorted_row_ids() {
        // Rows arrive in (cost, agreements) order, which need not be ID
        // order: Z and Y each cover column 0, A and B each cover column 1,
        // all at cost 1. Every pair across the two columns is a minimum
        // solution, and the tie-break must compare the solutions' sorted
        // ID sets, not their stored sequences.
        let rows = vec![
            row("Z", &[0], 1.0),
            row("Y", &[0], 1.0),
            row("A", &[1], 1.0),
            row("B", &[1], 1.0),
        ];
        let target = bitmap(&[0, 1]);
        let outcome = SetCoverSolver::new(&rows, target, None, None).solve();
        let found: Vec<&[String]> = outcome.solutions.iter().map(|s| &s.rows[..]).collect();
        assert_eq!(
            found,
            [
                &["Y".to_owned(), "A".to_owned()][..],
                &["Z".to_owned(), "A".to_owned()][..],
                &["Y".to_owned(), "B".to_owned()][..],
                &["Z".to_owned(), "B".to_owned()][..],
            ]
        );
    }

    #[test]
    fn greedy_prunes_redundant_rows() {
        let rows = vec![
            row("A", &[0, 1, 2], 1.0),
            row("B", &[3], 1.0),
            row("C", &[0, 1, 2, 3], 5.0),
        ];
        let target = bitmap(&[0, 1, 2, 3]);
        let solver = SetCoverSolver::new(&rows, target.clone(), None, None);
        let all: Vec<usize> = (0..rows.len()).collect();
        // Greedy picks A (density 1/3), then B (density 1); C is redundant.
        assert_eq!(solver.greedy_solution(&target, &all), 2.0);
    }

    #[test]
    fn solution_agreements_is_union_cardinality() {
        let mut a = row("A", &[0, 1], 1.0);
        a.agreements = bitmap(&[0, 5]);
        let mut b = row("B", &[2], 1.0);
        b.agreements = bitmap(&[5, 6]);
        let rows = vec![a, b];
        let target = bitmap(&[0, 1, 2]);
        let outcome = SetCoverSolver::new(&rows, target, None, None).solve();
        assert_eq!(outcome.solutions.len(), 1);
        assert_eq!(outcome.solutions[0].agreements, 3);
    }

    #[test]
    fn expired_deadline_truncates() {
        // No uniquely-covering rows, so the search itself must run and hit
        // the already-expired deadline immediately.
        let rows = vec![row("A", &[0, 1], 1.0), row("B", &[0, 1], 2.0)];
        let target = bitmap(&[0, 1]);
        let deadline = Instant::now() - std::time::Duration::from_secs(1);
        let outcome = SetCoverSolver::new(&rows, target, None, Some(deadline)).solve();
        assert!(outcome.truncated);
        assert!(outcome.solutions.is_empty());
    }
}
