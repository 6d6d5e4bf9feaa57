use crate::error::{ChemError, Result};
use crate::network::Stoichiometry;
use crate::reaction::ReactionId;
use ndarray::Array1;

fn column_of(stoichiometry: &Stoichiometry, reaction: ReactionId) -> Result<usize> {
    stoichiometry
        .reactions
        .binary_search(&reaction)
        .map_err(|_| ChemError::UnknownReaction(reaction))
}

/// Replays a trajectory and finds the time-weighted mean copy numbers.
///
/// Arguments:
///  - initial: copy numbers at `start_time`, in the row order of
///    `stoichiometry`.
///  - trajectory: absolute firing times and the reactions that fired, as
///    recorded by [`crate::simulate::Simulation`].
///  - end_time: the state after the last firing is held until this time.
///
/// Reactions are looked up in `stoichiometry`, so it must be taken from the
/// network before any reaction was removed.
pub fn time_averaged_copy_numbers(
    initial: &Array1<u64>,
    stoichiometry: &Stoichiometry,
    trajectory: &[(f64, ReactionId)],
    start_time: f64,
    end_time: f64,
) -> Result<Array1<f64>> {
    let mut state: Array1<f64> = initial.mapv(|n| n as f64);
    let mut weighted = Array1::zeros(state.len());
    let mut t = start_time;
    for &(time, reaction) in trajectory {
        let column = column_of(stoichiometry, reaction)?;
        weighted.scaled_add(time - t, &state);
        state += &stoichiometry.matrix.column(column).mapv(|delta| delta as f64);
        t = time;
    }
    weighted.scaled_add(end_time - t, &state);
    let span = end_time - start_time;
    if span <= 0. {
        return Ok(state);
    }
    Ok(weighted / span)
}

/// How often each reaction of `stoichiometry` fired.
pub fn firing_counts(stoichiometry: &Stoichiometry, trajectory: &[(f64, ReactionId)]) -> Result<Array1<u64>> {
    let mut counts = Array1::zeros(stoichiometry.reactions.len());
    for &(_, reaction) in trajectory {
        counts[column_of(stoichiometry, reaction)?] += 1;
    }
    Ok(counts)
}
