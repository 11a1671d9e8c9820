use crate::archive::GridVolume;
use crate::error::{ProcessingError, Result};
use crate::models::{ExtractedSlice, ExtractionQuery, TimeSelection};
use crate::utils::constants::LEVEL_MATCH_TOLERANCE;
use crate::utils::coordinates::{normalize_longitude, LongitudeConvention};
use chrono::NaiveDateTime;
use tracing::{debug, warn};

/// Index of the coordinate closest to `query` on a monotonic axis.
///
/// Ascending and descending axes are both supported. When the query sits
/// exactly halfway between two coordinates the lower index wins.
pub fn nearest_index(axis: &[f64], query: f64) -> Result<usize> {
    if axis.is_empty() {
        return Err(ProcessingError::InvalidFormat(
            "cannot select from an empty axis".to_string(),
        ));
    }
    if !query.is_finite() {
        return Err(ProcessingError::InvalidCoordinate(format!(
            "non-finite query value {}",
            query
        )));
    }

    let ascending = axis[0] <= axis[axis.len() - 1];
    let split = if ascending {
        axis.partition_point(|&c| c < query)
    } else {
        axis.partition_point(|&c| c > query)
    };

    if split == 0 {
        return Ok(0);
    }
    if split == axis.len() {
        return Ok(axis.len() - 1);
    }

    let before = (query - axis[split - 1]).abs();
    let after = (axis[split] - query).abs();
    if after < before {
        Ok(split)
    } else {
        Ok(split - 1)
    }
}

/// Nearest step on a time axis, same tie rule as [`nearest_index`].
pub fn nearest_time_index(axis: &[NaiveDateTime], query: NaiveDateTime) -> Result<usize> {
    let Some(&origin) = axis.first() else {
        return Err(ProcessingError::InvalidFormat(
            "cannot select from an empty time axis".to_string(),
        ));
    };
    let seconds: Vec<f64> = axis
        .iter()
        .map(|t| t.signed_duration_since(origin).num_seconds() as f64)
        .collect();
    nearest_index(
        &seconds,
        query.signed_duration_since(origin).num_seconds() as f64,
    )
}

/// Resolves station queries against an open grid volume.
pub struct PointSelector {
    level_tolerance: f64,
}

impl PointSelector {
    pub fn new() -> Self {
        Self {
            level_tolerance: LEVEL_MATCH_TOLERANCE,
        }
    }

    /// Extract the values a query asks for. The volume is only read.
    ///
    /// The nearest-longitude search runs along the axis as stored and does
    /// not wrap across the 0/360 or -180/180 seam.
    pub fn select(&self, volume: &dyn GridVolume, query: &ExtractionQuery) -> Result<ExtractedSlice> {
        if !volume.has_variable(&query.variable) {
            return Err(ProcessingError::VariableMissing {
                variable: query.variable.clone(),
                source_name: volume.name().to_string(),
            });
        }

        let axes = volume.axes();
        let lat_idx = nearest_index(&axes.latitudes, query.station.latitude)?;
        let convention = LongitudeConvention::detect(&axes.longitudes);
        let lon_idx = nearest_index(&axes.longitudes, convention.convert(query.station.longitude))?;

        let time_indices = self.time_indices(&axes.times, query.time)?;
        let (level_indices, unresolved) = self.level_indices(volume, query.levels.as_deref())?;

        let mut slice = ExtractedSlice::new(
            query.station.id,
            &query.variable,
            axes.latitudes[lat_idx],
            normalize_longitude(axes.longitudes[lon_idx]),
        );
        slice.unresolved_levels = unresolved;

        if time_indices.is_empty() {
            debug!(
                station = %query.station.id,
                file = volume.name(),
                "no time steps selected"
            );
            return Ok(slice);
        }

        let level_idx: Option<Vec<usize>> = level_indices
            .as_ref()
            .map(|levels| levels.iter().map(|(idx, _)| *idx).collect());
        let values = volume.read_column(
            &query.variable,
            lat_idx,
            lon_idx,
            &time_indices,
            level_idx.as_deref(),
        )?;

        let mut values = values.into_iter();
        for &t in &time_indices {
            let time = axes.times[t];
            match &level_indices {
                Some(levels) => {
                    for &(_, level) in levels {
                        if let Some(value) = values.next() {
                            slice.push(time, Some(level), value);
                        }
                    }
                }
                None => {
                    if let Some(value) = values.next() {
                        slice.push(time, None, value);
                    }
                }
            }
        }

        Ok(slice)
    }

    fn time_indices(&self, axis: &[NaiveDateTime], selection: TimeSelection) -> Result<Vec<usize>> {
        match selection {
            TimeSelection::All => Ok((0..axis.len()).collect()),
            TimeSelection::Nearest(t) => Ok(vec![nearest_time_index(axis, t)?]),
            TimeSelection::Range(start, end) => Ok(axis
                .iter()
                .enumerate()
                .filter(|(_, t)| **t >= start && **t <= end)
                .map(|(i, _)| i)
                .collect()),
        }
    }

    /// Level axis indices paired with their hPa value, plus the requested
    /// levels that could not be matched.
    #[allow(clippy::type_complexity)]
    fn level_indices(
        &self,
        volume: &dyn GridVolume,
        requested: Option<&[i32]>,
    ) -> Result<(Option<Vec<(usize, i32)>>, Vec<i32>)> {
        let axis = volume.axes().levels.as_ref();

        match (axis, requested) {
            (None, None) => Ok((None, Vec::new())),
            (Some(axis), None) => Ok((
                Some(
                    axis.iter()
                        .enumerate()
                        .map(|(i, l)| (i, l.round() as i32))
                        .collect(),
                ),
                Vec::new(),
            )),
            (None, Some(levels)) => Err(ProcessingError::LevelNotFound {
                levels: levels.to_vec(),
                source_name: volume.name().to_string(),
            }),
            (Some(axis), Some(levels)) => {
                let mut resolved = Vec::with_capacity(levels.len());
                let mut unresolved = Vec::new();
                for &level in levels {
                    match axis
                        .iter()
                        .position(|&l| (l - level as f64).abs() <= self.level_tolerance)
                    {
                        Some(idx) => resolved.push((idx, level)),
                        None => unresolved.push(level),
                    }
                }

                if resolved.is_empty() {
                    return Err(ProcessingError::LevelNotFound {
                        levels: unresolved,
                        source_name: volume.name().to_string(),
                    });
                }
                if !unresolved.is_empty() {
                    warn!(
                        file = volume.name(),
                        levels = ?unresolved,
                        "requested pressure levels not present"
                    );
                }
                Ok((Some(resolved), unresolved))
            }
        }
    }
}

impl Default for PointSelector {
    fn default() -> Self {
        Self::new()
    }
}
