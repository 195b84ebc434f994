// Duration resolver: assigns minima-lengths to one measure.
//
// A measure is the run of symbols between two punctus marks (see
// locator.rs). Under a divisione the measure must add up to the mode's
// minima count, but most symbol types can be read more than one way. The
// resolver works in four stages:
//
// 1. Fixed pass. Maxima, longa and brevis are 4, 2 and 1 breves of the
//    declared mode. Minimae are 1 (1.5 with a side stem), side-stemmed
//    semibreves are 3, and semibrevis rests are a half (`.q.`, `.i.`) or a
//    third (`.p.`, `.n.`) of the measure.
// 2. Classification. The remaining semibreves and semiminimae are sorted
//    into plain semibreves, down-stemmed semibreves, left- and right-flagged
//    semiminimae and semiminima rests. Down-stemmed semibreves are "sinks"
//    that absorb whatever the measure has left; without one, a measure
//    ending on a plain semibrevis lets that semibrevis absorb the rest.
// 3. Search. Every flexible symbol gets a baseline value, and some may be
//    extended (a ternary 2 to 3, a compound 2 to 4, a semiminima 1/2 to
//    2/3). Combinations of extensions are walked lazily, smallest first,
//    and only up to as many extensions as the budget can still absorb;
//    when some reading can fill the measure exactly, only exact ones are
//    scored. The sinks take up the remainder. Readings that fill the
//    measure exactly beat readings that underfill it, then the metrical
//    strength score decides (strength.rs), then fewer extensions, then
//    whichever was found first. `max_candidates` bounds the walk for each
//    semiminima flag reading.
// 4. Fallback. A measure with no legal reading is retried with its budget
//    doubled, up to `max_fallback_doublings` times; after that it is an
//    error.
//
// Resolution is a pure function of the symbols, the mode and the config.

use crate::config::EngineConfig;
use crate::error::{MensuralError, Result};
use crate::mode::{Divisione, RhythmicMode, SemibrevisRule};
use crate::strength;
use crate::symbol::{FlagOrientation, MensuralSymbol, MensuralType, Stem};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use tracing::{debug, warn};

const HALF: f64 = 0.5;
const TWO_THIRDS: f64 = 2.0 / 3.0;

/// The outcome of resolving one measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// One length per symbol, in minimae.
    pub lengths: Vec<f64>,
    /// The budget the lengths were fitted to: the mode's minima count,
    /// doubled once per fallback.
    pub minima_per_brevis: f64,
    pub doublings: u32,
    /// Whether the lengths fill the budget exactly.
    pub exact: bool,
    /// Strength score of the chosen reading.
    pub score: f64,
}

impl Resolution {
    pub fn total(&self) -> f64 {
        self.lengths.iter().sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Resolver {
    config: EngineConfig,
}

impl Resolver {
    pub fn new(config: EngineConfig) -> Self {
        Resolver { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Lengths (in minimae) for each symbol of the measure.
    pub fn resolve(&self, mode: &RhythmicMode, symbols: &[MensuralSymbol]) -> Result<Vec<f64>> {
        Ok(self.resolve_detailed(mode, symbols)?.lengths)
    }

    pub fn resolve_detailed(
        &self,
        mode: &RhythmicMode,
        symbols: &[MensuralSymbol],
    ) -> Result<Resolution> {
        let divisione = mode
            .as_divisione()
            .ok_or_else(|| MensuralError::UnsupportedMode(mode.symbol().to_string()))?;
        let declared = mode.minima_per_brevis();
        let tol = self.config.tolerance;

        if symbols.iter().all(|s| s.mensural_type().is_fixed()) {
            let lengths = symbols
                .iter()
                .map(|s| fixed_length(s.mensural_type(), declared))
                .collect();
            return Ok(Resolution {
                lengths,
                minima_per_brevis: declared,
                doublings: 0,
                exact: true,
                score: 0.0,
            });
        }

        let mut budget = declared;
        for doublings in 0..=self.config.max_fallback_doublings {
            let plan = Plan::new(divisione, symbols, declared, budget)?;
            let mut scoring_mode = *mode;
            scoring_mode.set_minima_per_brevis(budget);

            if let Some(best) = plan.search(&scoring_mode, symbols, &self.config) {
                let lengths: Vec<f64> = best.lengths.iter().map(|&l| snap(l, tol)).collect();
                if !best.exact {
                    warn!(
                        mode = %mode.symbol(),
                        budget,
                        total = lengths.iter().sum::<f64>(),
                        "no reading fills the measure exactly; keeping the best underfilled one"
                    );
                }
                debug!(
                    mode = %mode.symbol(),
                    symbols = %labels(symbols),
                    ?lengths,
                    score = best.score,
                    doublings,
                    "resolved measure"
                );
                return Ok(Resolution {
                    lengths,
                    minima_per_brevis: budget,
                    doublings,
                    exact: best.exact,
                    score: best.score,
                });
            }

            warn!(
                mode = %mode.symbol(),
                symbols = %labels(symbols),
                budget,
                "no legal reading; doubling the measure"
            );
            budget *= 2.0;
        }

        Err(MensuralError::UnreconcilableMeasure {
            budget: declared,
            reason: format!(
                "[{}] has no legal reading within {} doubling(s)",
                labels(symbols),
                self.config.max_fallback_doublings
            ),
        })
    }
}

/// Resolve with the default configuration.
pub fn resolve(mode: &RhythmicMode, symbols: &[MensuralSymbol]) -> Result<Vec<f64>> {
    Resolver::default().resolve(mode, symbols)
}

fn fixed_length(t: MensuralType, minima_per_brevis: f64) -> f64 {
    match t {
        MensuralType::Maxima => 4.0 * minima_per_brevis,
        MensuralType::Longa => 2.0 * minima_per_brevis,
        _ => minima_per_brevis,
    }
}

fn snap(value: f64, tolerance: f64) -> f64 {
    let rounded = value.round();
    if (value - rounded).abs() <= tolerance {
        rounded
    } else {
        value
    }
}

fn labels(symbols: &[MensuralSymbol]) -> String {
    symbols
        .iter()
        .map(MensuralSymbol::label)
        .collect::<Vec<_>>()
        .join(" ")
}

/// A classified measure, ready for the search.
struct Plan {
    rule: SemibrevisRule,
    budget: f64,
    /// Baseline lengths; sinks hold 0 until the search fills them.
    base: Vec<f64>,
    /// Plain semibreves that may be extended.
    extendable_sb: Vec<usize>,
    sinks: Vec<usize>,
    sink_floor: f64,
    sm_left: Vec<usize>,
    sm_right: Vec<usize>,
    sm_rests: Vec<usize>,
}

impl Plan {
    fn new(
        divisione: Divisione,
        symbols: &[MensuralSymbol],
        declared: f64,
        budget: f64,
    ) -> Result<Plan> {
        let rule = divisione.semibrevis_rule();
        let n = symbols.len();
        let mut base = vec![0.0; n];
        let mut plain = Vec::new();
        let mut down = Vec::new();
        let mut sm_left = Vec::new();
        let mut sm_right = Vec::new();
        let mut sm_rests = Vec::new();

        for (i, s) in symbols.iter().enumerate() {
            let t = s.mensural_type();
            match t {
                MensuralType::Maxima | MensuralType::Longa | MensuralType::Brevis => {
                    base[i] = fixed_length(t, declared);
                }
                MensuralType::Semibrevis if s.is_rest() => match divisione {
                    Divisione::Quaternaria | Divisione::SenariaImperfecta => base[i] = budget / 2.0,
                    Divisione::SenariaPerfecta | Divisione::Novenaria => base[i] = budget / 3.0,
                    Divisione::Octonaria | Divisione::Duodenaria => plain.push(i),
                },
                MensuralType::Semibrevis => {
                    if s.has_stem(Stem::Side) {
                        base[i] = 3.0;
                    } else if s.has_stem(Stem::Down) {
                        down.push(i);
                    } else {
                        plain.push(i);
                    }
                }
                MensuralType::Minima | MensuralType::Semiminima if s.has_stem(Stem::Down) => {
                    return Err(MensuralError::UnsupportedDragma(i));
                }
                MensuralType::Minima => {
                    base[i] = if s.has_stem(Stem::Side) { 1.5 } else { 1.0 };
                }
                MensuralType::Semiminima if s.is_rest() => sm_rests.push(i),
                MensuralType::Semiminima => match s.flag(Stem::Up) {
                    Some(FlagOrientation::Left) => sm_left.push(i),
                    _ => sm_right.push(i),
                },
            }
        }

        let mut sinks = down;
        let mut sink_floor = match rule {
            SemibrevisRule::Binary => 2.0,
            SemibrevisRule::Ternary => 3.0,
            SemibrevisRule::Compound => 4.0,
        };
        if sinks.is_empty() && plain.last() == Some(&(n - 1)) {
            sinks.extend(plain.pop());
            if rule == SemibrevisRule::Compound {
                sink_floor = 2.0;
            }
        }

        let mut extendable_sb = Vec::new();
        for &i in &plain {
            base[i] = match rule {
                SemibrevisRule::Binary => 2.0,
                SemibrevisRule::Ternary => {
                    let before_minima = symbols
                        .get(i + 1)
                        .is_some_and(|next| next.mensural_type() == MensuralType::Minima);
                    if before_minima {
                        extendable_sb.push(i);
                        2.0
                    } else {
                        3.0
                    }
                }
                SemibrevisRule::Compound => {
                    extendable_sb.push(i);
                    2.0
                }
            };
        }

        Ok(Plan {
            rule,
            budget,
            base,
            extendable_sb,
            sinks,
            sink_floor,
            sm_left,
            sm_right,
            sm_rests,
        })
    }

    fn sb_step(&self) -> f64 {
        match self.rule {
            SemibrevisRule::Binary => 0.0,
            SemibrevisRule::Ternary => 1.0,
            SemibrevisRule::Compound => 2.0,
        }
    }

    /// (left, right) semiminima values to try. Both orientations present
    /// means they may differ; otherwise only uniform readings make sense.
    fn flag_pairs(&self) -> Vec<(f64, f64)> {
        match (self.sm_left.is_empty(), self.sm_right.is_empty()) {
            (false, false) => vec![
                (HALF, HALF),
                (TWO_THIRDS, HALF),
                (HALF, TWO_THIRDS),
                (TWO_THIRDS, TWO_THIRDS),
            ],
            (true, true) => vec![(HALF, HALF)],
            _ => vec![(HALF, HALF), (TWO_THIRDS, TWO_THIRDS)],
        }
    }

    /// A semiminima rest takes the value of the flagged semiminimae around
    /// it when they agree, and 1/2 otherwise.
    fn rest_value(&self, rest: usize, left: f64, right: f64) -> f64 {
        let orientation = |i: usize| {
            if self.sm_left.contains(&i) {
                FlagOrientation::Left
            } else {
                FlagOrientation::Right
            }
        };
        let flagged = self.sm_left.iter().chain(&self.sm_right).copied();
        let before = flagged.clone().filter(|&i| i < rest).max().map(orientation);
        let after = flagged.filter(|&i| i > rest).min().map(orientation);
        let agreed = match (before, after) {
            (Some(a), Some(b)) if a == b => Some(a),
            (Some(_), Some(_)) => None,
            (a, b) => a.or(b),
        };
        match agreed {
            Some(FlagOrientation::Left) => left,
            Some(FlagOrientation::Right) => right,
            None => HALF,
        }
    }

    /// Baseline lengths for one flag pair, and how much budget is left for
    /// extensions once every sink holds its floor. `None` when the
    /// baseline alone already overruns.
    fn baseline(&self, left: f64, right: f64, tol: f64) -> Option<Baseline> {
        let mut lengths = self.base.clone();
        for &i in &self.sm_left {
            lengths[i] = left;
        }
        for &i in &self.sm_right {
            lengths[i] = right;
        }
        for &i in &self.sm_rests {
            lengths[i] = self.rest_value(i, left, right);
        }
        let reserve = self.sink_floor * self.sinks.len() as f64;
        let room = self.budget - lengths.iter().sum::<f64>() - reserve;
        if room < -tol {
            return None;
        }
        let mut extendable_sm: Vec<usize> = self
            .sm_left
            .iter()
            .chain(&self.sm_right)
            .chain(&self.sm_rests)
            .copied()
            .filter(|&i| (lengths[i] - HALF).abs() < tol)
            .collect();
        extendable_sm.sort_unstable();
        Some(Baseline {
            lengths,
            extendable_sm,
            room,
        })
    }

    /// Largest number of semibrevis extensions that fits in `room`.
    fn max_sb_extensions(&self, room: f64, tol: f64) -> usize {
        let step = self.sb_step();
        if step <= 0.0 {
            return 0;
        }
        (((room + tol) / step).floor().max(0.0) as usize).min(self.extendable_sb.len())
    }

    /// Semiminima extension counts worth trying with `room` left. With
    /// `exact_only`, just the count that fills the room exactly, if any.
    fn sm_extension_counts(
        room: f64,
        available: usize,
        exact_only: bool,
        tol: f64,
    ) -> Option<RangeInclusive<usize>> {
        if !exact_only {
            let fit = (((room + tol) * 6.0).floor().max(0.0) as usize).min(available);
            return Some(0..=fit);
        }
        let k = (room * 6.0).round();
        let fills = k >= 0.0 && (k as usize) <= available && (room - k / 6.0).abs() <= tol;
        fills.then(|| k as usize..=k as usize)
    }

    fn search(
        &self,
        mode: &RhythmicMode,
        symbols: &[MensuralSymbol],
        config: &EngineConfig,
    ) -> Option<Candidate> {
        let tol = config.tolerance;
        let step = self.sb_step();
        let baselines: Vec<Baseline> = self
            .flag_pairs()
            .into_iter()
            .filter_map(|(left, right)| self.baseline(left, right, tol))
            .collect();

        // Sinks absorb any slack, so every fitting reading fills the
        // measure. Without one, only readings whose extensions use up the
        // room exactly can be exact, and once any such reading exists the
        // underfilled ones can never win.
        let exact_only = self.sinks.is_empty()
            && baselines.iter().any(|b| {
                (0..=self.max_sb_extensions(b.room, tol)).any(|k_sb| {
                    let rest = b.room - k_sb as f64 * step;
                    Self::sm_extension_counts(rest, b.extendable_sm.len(), true, tol).is_some()
                })
            });

        let mut best: Option<Candidate> = None;
        let mut total = 0usize;
        for b in &baselines {
            let mut examined = 0usize;
            for k_sb in 0..=self.max_sb_extensions(b.room, tol) {
                let rest = b.room - k_sb as f64 * step;
                let Some(sm_counts) =
                    Self::sm_extension_counts(rest, b.extendable_sm.len(), exact_only, tol)
                else {
                    continue;
                };
                let stopped = !for_each_subset(&self.extendable_sb, k_sb, &mut |sb_set| {
                    for k_sm in sm_counts.clone() {
                        let more = for_each_subset(&b.extendable_sm, k_sm, &mut |sm_set| {
                            if examined >= config.max_candidates {
                                return false;
                            }
                            examined += 1;
                            let candidate = self.candidate(b, sb_set, sm_set, mode, symbols, config);
                            if best.as_ref().is_none_or(|c| candidate.beats(c)) {
                                best = Some(candidate);
                            }
                            true
                        });
                        if !more {
                            return false;
                        }
                    }
                    true
                });
                if stopped {
                    warn!(
                        mode = %mode.symbol(),
                        limit = config.max_candidates,
                        "reading search hit its candidate limit; keeping the best so far"
                    );
                    break;
                }
            }
            total += examined;
        }
        debug!(examined = total, exact_only, "searched measure readings");
        best
    }

    /// Apply one choice of extensions to a baseline and let the sinks take
    /// up the rest.
    fn candidate(
        &self,
        baseline: &Baseline,
        sb_set: &[usize],
        sm_set: &[usize],
        mode: &RhythmicMode,
        symbols: &[MensuralSymbol],
        config: &EngineConfig,
    ) -> Candidate {
        let tol = config.tolerance;
        let mut lengths = baseline.lengths.clone();
        for &i in sb_set {
            lengths[i] += self.sb_step();
        }
        for &i in sm_set {
            lengths[i] += 1.0 / 6.0;
        }
        let mut remaining = self.budget - lengths.iter().sum::<f64>();
        if let Some((&last, others)) = self.sinks.split_last() {
            for &j in others {
                lengths[j] = self.sink_floor;
                remaining -= self.sink_floor;
            }
            lengths[last] = remaining;
            remaining = 0.0;
        }
        Candidate {
            exact: remaining.abs() <= tol,
            score: strength::score_with(mode, symbols, &lengths, &config.weights, tol),
            extensions: sb_set.len() + sm_set.len(),
            lengths,
        }
    }
}

struct Baseline {
    lengths: Vec<f64>,
    extendable_sm: Vec<usize>,
    /// Budget left for extensions.
    room: f64,
}

struct Candidate {
    lengths: Vec<f64>,
    exact: bool,
    score: f64,
    extensions: usize,
}

impl Candidate {
    fn beats(&self, other: &Candidate) -> bool {
        const SCORE_EPSILON: f64 = 1e-9;
        if self.exact != other.exact {
            return self.exact;
        }
        if self.score > other.score + SCORE_EPSILON {
            return true;
        }
        if self.score < other.score - SCORE_EPSILON {
            return false;
        }
        self.extensions < other.extensions
    }
}

/// Visit every `k`-element subset of `items`, subsets that reach later
/// positions first. `visit` returns false to stop; the return value is
/// false when the walk was stopped early.
fn for_each_subset<F>(items: &[usize], k: usize, visit: &mut F) -> bool
where
    F: FnMut(&[usize]) -> bool,
{
    fn walk<F>(items: &[usize], k: usize, end: usize, picked: &mut Vec<usize>, visit: &mut F) -> bool
    where
        F: FnMut(&[usize]) -> bool,
    {
        let need = k - picked.len();
        if need == 0 {
            return visit(picked);
        }
        for i in (need - 1..end).rev() {
            picked.push(items[i]);
            let more = walk(items, k, i, picked, visit);
            picked.pop();
            if !more {
                return false;
            }
        }
        true
    }

    if k > items.len() {
        return true;
    }
    walk(items, k, items.len(), &mut Vec::with_capacity(k), visit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::{Prolation, Tempus};

    fn note(t: MensuralType) -> MensuralSymbol {
        MensuralSymbol::note(t, "A4".parse().unwrap())
    }

    fn sb() -> MensuralSymbol {
        note(MensuralType::Semibrevis)
    }

    fn sb_down() -> MensuralSymbol {
        sb().with_stem(Stem::Down).unwrap()
    }

    fn m() -> MensuralSymbol {
        note(MensuralType::Minima)
    }

    fn sm() -> MensuralSymbol {
        note(MensuralType::Semiminima)
    }

    fn sm_left() -> MensuralSymbol {
        sm().with_flag(Stem::Up, FlagOrientation::Left).unwrap()
    }

    fn sm_rest() -> MensuralSymbol {
        MensuralSymbol::rest(MensuralType::Semiminima)
    }

    fn mode(d: Divisione) -> RhythmicMode {
        RhythmicMode::divisione(d)
    }

    fn assert_lengths(got: &[f64], expected: &[f64]) {
        assert_eq!(got.len(), expected.len(), "{got:?} vs {expected:?}");
        for (g, e) in got.iter().zip(expected) {
            assert!((g - e).abs() < 1e-6, "{got:?} vs {expected:?}");
        }
    }

    fn subsets(items: &[usize], k: usize) -> Vec<Vec<usize>> {
        let mut out = Vec::new();
        for_each_subset(items, k, &mut |set| {
            let mut set = set.to_vec();
            set.sort_unstable();
            out.push(set);
            true
        });
        out
    }

    #[test]
    fn test_subset_order() {
        assert_eq!(subsets(&[1, 2, 3], 0), vec![Vec::<usize>::new()]);
        assert_eq!(subsets(&[1, 2, 3], 1), vec![vec![3], vec![2], vec![1]]);
        assert_eq!(
            subsets(&[1, 2, 3], 2),
            vec![vec![2, 3], vec![1, 3], vec![1, 2]]
        );
        assert_eq!(subsets(&[1, 2, 3], 3), vec![vec![1, 2, 3]]);
        assert!(subsets(&[1, 2], 3).is_empty());
    }

    #[test]
    fn test_subset_walk_stops_early() {
        let mut seen = 0;
        let finished = for_each_subset(&[0, 1, 2, 3, 4, 5], 3, &mut |_| {
            seen += 1;
            seen < 4
        });
        assert!(!finished);
        assert_eq!(seen, 4);
    }

    #[test]
    fn test_senaria_imperfecta_sb_m_sb() {
        let got = resolve(&mode(Divisione::SenariaImperfecta), &[sb(), m(), sb()]).unwrap();
        assert_lengths(&got, &[2.0, 1.0, 3.0]);
    }

    #[test]
    fn test_novenaria_minima_run() {
        let symbols = [sb(), m(), m(), m(), sb(), m()];
        let got = resolve(&mode(Divisione::Novenaria), &symbols).unwrap();
        assert_lengths(&got, &[3.0, 1.0, 1.0, 1.0, 2.0, 1.0]);
    }

    #[test]
    fn test_novenaria_trailing_semibrevis_absorbs() {
        let got = resolve(&mode(Divisione::Novenaria), &[sb(), m(), sb()]).unwrap();
        assert_lengths(&got, &[2.0, 1.0, 6.0]);
        let got = resolve(&mode(Divisione::Novenaria), &[sb_down(), m(), sb()]).unwrap();
        assert_lengths(&got, &[5.0, 1.0, 3.0]);
    }

    #[test]
    fn test_quaternaria_semiminimae_around_rest() {
        let third = TWO_THIRDS;
        let expected = [1.0, 0.5, 0.5, third, third, third];

        let all_right = [m(), sm(), sm(), sm(), sm_rest(), sm()];
        let got = resolve(&mode(Divisione::Quaternaria), &all_right).unwrap();
        assert_lengths(&got, &expected);

        let two_left = [m(), sm_left(), sm_left(), sm(), sm_rest(), sm()];
        let got = resolve(&mode(Divisione::Quaternaria), &two_left).unwrap();
        assert_lengths(&got, &expected);
    }

    #[test]
    fn test_senaria_perfecta_down_stem_sink() {
        let got = resolve(&mode(Divisione::SenariaPerfecta), &[m(), sb_down(), sm(), sm()]).unwrap();
        assert_lengths(&got, &[1.0, 4.0, 0.5, 0.5]);
    }

    #[test]
    fn test_senaria_perfecta_flag_groups() {
        let mut symbols = vec![sm_left(), sm_left(), sm_left(), sm_rest()];
        symbols.extend([sm(), sm(), sm(), sb()]);
        let got = resolve(&mode(Divisione::SenariaPerfecta), &symbols).unwrap();
        let t = TWO_THIRDS;
        assert_lengths(&got, &[t, t, t, 0.5, 0.5, 0.5, 0.5, 2.0]);
    }

    #[test]
    fn test_senaria_perfecta_semibreves() {
        let p = mode(Divisione::SenariaPerfecta);
        assert_lengths(&resolve(&p, &[sb(), sb(), sb()]).unwrap(), &[2.0, 2.0, 2.0]);
        assert_lengths(&resolve(&p, &[sb(), sb()]).unwrap(), &[2.0, 4.0]);
    }

    #[test]
    fn test_duodenaria_semibreves() {
        let d = mode(Divisione::Duodenaria);
        assert_lengths(&resolve(&d, &[sb(), sb()]).unwrap(), &[4.0, 8.0]);
        assert_lengths(&resolve(&d, &[sb(), sb(), sb()]).unwrap(), &[4.0, 4.0, 4.0]);
        assert_lengths(&resolve(&d, &[sb(), sb(), sb(), sb()]).unwrap(), &[2.0, 2.0, 4.0, 4.0]);
    }

    #[test]
    fn test_duodenaria_down_stems() {
        let d = mode(Divisione::Duodenaria);
        let middle = [sb(), sb_down(), sb_down(), sb()];
        assert_lengths(&resolve(&d, &middle).unwrap(), &[2.0, 4.0, 4.0, 2.0]);
        let leading = [sb_down(), sb_down(), sb(), sb()];
        assert_lengths(&resolve(&d, &leading).unwrap(), &[4.0, 4.0, 2.0, 2.0]);
    }

    #[test]
    fn test_octonaria() {
        let o = mode(Divisione::Octonaria);
        assert_lengths(&resolve(&o, &[sb(), sb_down(), sb()]).unwrap(), &[2.0, 4.0, 2.0]);
        let t = TWO_THIRDS;
        let got = resolve(&o, &[sm(), sm(), sm(), sb(), sb()]).unwrap();
        assert_lengths(&got, &[t, t, t, 2.0, 4.0]);
    }

    #[test]
    fn test_fallback_doubles_budget() {
        let resolver = Resolver::default();
        let q = mode(Divisione::Quaternaria);
        let res = resolver.resolve_detailed(&q, &[sb(), sb(), sb()]).unwrap();
        assert_lengths(&res.lengths, &[2.0, 2.0, 4.0]);
        assert_eq!(res.doublings, 1);
        assert_eq!(res.minima_per_brevis, 8.0);
        assert_eq!(res.total(), 8.0);
    }

    #[test]
    fn test_duodenaria_fallback_with_semiminimae() {
        let mut symbols = vec![sm(), sm(), sm(), sm_rest()];
        symbols.extend(std::iter::repeat_n(sb_down(), 5));
        symbols.extend([sm_left(), sm_left(), sm_left()]);
        let res = Resolver::default()
            .resolve_detailed(&mode(Divisione::Duodenaria), &symbols)
            .unwrap();
        let t = TWO_THIRDS;
        assert_lengths(
            &res.lengths,
            &[0.5, 0.5, 0.5, 0.5, 4.0, 4.0, 4.0, 4.0, 4.0, t, t, t],
        );
        assert_eq!(res.doublings, 1);
    }

    #[test]
    fn test_long_semiminima_run_resolves_quickly() {
        let symbols = vec![sm(); 24];
        let started = std::time::Instant::now();
        let res = Resolver::default()
            .resolve_detailed(&mode(Divisione::Duodenaria), &symbols)
            .unwrap();
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
        assert_lengths(&res.lengths, &[0.5; 24]);
        assert!(res.exact);
        assert_eq!(res.doublings, 0);
    }

    #[test]
    fn test_candidate_limit_bounds_search() {
        // Twenty semiminimae before a sink leave room for 2^20 extension
        // sets once the budget doubles.
        let mut symbols = vec![sm(); 20];
        symbols.push(sb_down());
        let config = EngineConfig {
            max_candidates: 500,
            ..EngineConfig::default()
        };
        let res = Resolver::new(config)
            .resolve_detailed(&mode(Divisione::Duodenaria), &symbols)
            .unwrap();
        assert!(res.exact);
        assert_eq!(res.doublings, 1);
        assert!((res.total() - 24.0).abs() < 1e-6);
        assert!(res.lengths[20] >= 4.0 - 1e-6);
    }

    #[test]
    fn test_unreconcilable_without_fallback() {
        let config = EngineConfig {
            max_fallback_doublings: 0,
            ..EngineConfig::default()
        };
        let err = Resolver::new(config)
            .resolve(&mode(Divisione::Quaternaria), &[sb(), sb(), sb()])
            .unwrap_err();
        assert!(matches!(err, MensuralError::UnreconcilableMeasure { .. }));
    }

    #[test]
    fn test_fixed_types_keep_declared_values() {
        let n = mode(Divisione::Novenaria);
        assert_lengths(&resolve(&n, &[note(MensuralType::Brevis)]).unwrap(), &[9.0]);
        assert_lengths(&resolve(&n, &[note(MensuralType::Longa)]).unwrap(), &[18.0]);
        assert_lengths(&resolve(&n, &[note(MensuralType::Maxima)]).unwrap(), &[36.0]);
        let mut changed = n;
        changed.set_minima_per_brevis(18.0);
        assert_lengths(&resolve(&changed, &[note(MensuralType::Brevis)]).unwrap(), &[18.0]);
    }

    #[test]
    fn test_side_stems_and_rests() {
        let q = mode(Divisione::Quaternaria);
        // Semibrevis rest in .q. is half the measure.
        let got = resolve(&q, &[MensuralSymbol::rest(MensuralType::Semibrevis), sb()]).unwrap();
        assert_lengths(&got, &[2.0, 2.0]);

        let n = mode(Divisione::Novenaria);
        let side_sb = sb().with_stem(Stem::Side).unwrap();
        let got = resolve(&n, &[side_sb, m(), m(), m(), sb()]).unwrap();
        assert_lengths(&got, &[3.0, 1.0, 1.0, 1.0, 3.0]);

        let side_m = m().with_stem(Stem::Side).unwrap();
        let got = resolve(&n, &[side_m.clone(), side_m, sb()]).unwrap();
        assert_lengths(&got, &[1.5, 1.5, 6.0]);
    }

    #[test]
    fn test_dragma_is_rejected() {
        let dragma = m().with_stem(Stem::Down).unwrap();
        let err = resolve(&mode(Divisione::Novenaria), &[sb(), dragma]).unwrap_err();
        assert!(matches!(err, MensuralError::UnsupportedDragma(1)));
    }

    #[test]
    fn test_french_mensuration_is_rejected() {
        let o = RhythmicMode::mensuration(Tempus::Perfect, Prolation::Major);
        let err = resolve(&o, &[sb(), sb()]).unwrap_err();
        assert!(matches!(err, MensuralError::UnsupportedMode(_)));
    }

    #[test]
    fn test_sum_invariant_across_modes() {
        let measures: Vec<Vec<MensuralSymbol>> = vec![
            vec![sb(), m(), sb()],
            vec![sb(), sb()],
            vec![m(), m(), sb()],
            vec![sm(), sm(), m(), sb()],
            vec![sb(), sb_down(), m()],
        ];
        for d in Divisione::ALL {
            for symbols in &measures {
                let res = Resolver::default().resolve_detailed(&mode(d), symbols).unwrap();
                if res.exact {
                    assert!(
                        (res.total() - res.minima_per_brevis).abs() < 1e-4,
                        "{d:?} {res:?}"
                    );
                } else {
                    assert!(res.total() < res.minima_per_brevis, "{d:?} {res:?}");
                }
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let symbols = [sm(), sm_left(), sm_rest(), sm(), sb(), m(), sb()];
        let a = Resolver::default().resolve_detailed(&mode(Divisione::Octonaria), &symbols);
        let b = Resolver::default().resolve_detailed(&mode(Divisione::Octonaria), &symbols);
        assert_eq!(a.unwrap(), b.unwrap());
    }

    #[test]
    fn test_empty_measure() {
        let got = resolve(&mode(Divisione::Novenaria), &[]).unwrap();
        assert!(got.is_empty());
    }
}
