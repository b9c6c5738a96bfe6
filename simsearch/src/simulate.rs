//! Simulated searches walking the neighbour graph from a query glyph to a target glyph.
use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, ErrorKind, Read, Write};
use std::str::FromStr;

use hashbrown::{HashMap, HashSet};
use stroke_align::StrokeCategory;

use crate::errors::{Result, SimsearchError};
use crate::glyph::GlyphRepository;
use crate::model::DEFAULT_NEIGHBORS_RECALLED;
use crate::query::QueryService;
use crate::store::ModelStore;

/// Default maximum number of steps of a simulated search.
pub const DEFAULT_PATH_LIMIT: usize = 5;

/// How the simulated user picks the next glyph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Strategy {
    /// Always moves to the unvisited neighbour that looks closest to the target.
    #[default]
    Greedy,
    /// Explores breadth-first, giving the shortest path within the limit.
    Shortest,
}

impl FromStr for Strategy {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "greedy" => Ok(Self::Greedy),
            "shortest" => Ok(Self::Shortest),
            _ => Err("Could not parse a strategy value"),
        }
    }
}

/// The walk of one simulated search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trace {
    /// Glyph the search started from.
    pub query: String,
    /// Glyph searched for.
    pub target: String,
    /// Visited glyphs starting with `query`, or `None` if no step could be made.
    pub path: Option<Vec<String>>,
}

impl Trace {
    /// Checks if the path reached the target.
    pub fn is_success(&self) -> bool {
        self.path
            .as_ref()
            .and_then(|p| p.last())
            .map_or(false, |last| *last == self.target)
    }
}

/// Runs simulated searches against a [`QueryService`].
///
/// Neighbour lists and resolved strokes are cached for the lifetime of the simulator.
pub struct Simulator<'a, R, S> {
    service: &'a QueryService<R, S>,
    strategy: Strategy,
    limit: usize,
    recalled: usize,
    neighbours: HashMap<String, Vec<String>>,
    strokes: HashMap<String, Option<Vec<StrokeCategory>>>,
}

impl<'a, R, S> Simulator<'a, R, S>
where
    R: GlyphRepository,
    S: ModelStore,
{
    /// Creates an instance with the default limit and recall.
    pub fn new(service: &'a QueryService<R, S>, strategy: Strategy) -> Self {
        Self {
            service,
            strategy,
            limit: DEFAULT_PATH_LIMIT,
            recalled: DEFAULT_NEIGHBORS_RECALLED,
            neighbours: HashMap::new(),
            strokes: HashMap::new(),
        }
    }

    /// Sets the maximum number of steps.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the number of neighbours shown at each step (must be more than 0).
    pub fn recalled(mut self, recalled: usize) -> Result<Self> {
        if recalled == 0 {
            return Err(SimsearchError::input("recalled must not be 0."));
        }
        self.recalled = recalled;
        Ok(self)
    }

    /// Simulates the search of every pair.
    pub fn run<I>(&mut self, pairs: I) -> Result<Vec<Trace>>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut traces = vec![];
        for (query, target) in pairs {
            let path = self.search(&query, &target)?;
            tracing::debug!(%query, %target, ?path, "simulated");
            traces.push(Trace {
                query,
                target,
                path,
            });
        }
        Ok(traces)
    }

    /// Simulates one search with the configured strategy.
    pub fn search(&mut self, query: &str, target: &str) -> Result<Option<Vec<String>>> {
        match self.strategy {
            Strategy::Greedy => self.greedy(query, target),
            Strategy::Shortest => self.shortest(query, target),
        }
    }

    fn greedy(&mut self, query: &str, target: &str) -> Result<Option<Vec<String>>> {
        // Closeness to the target needs both sides alignable.
        if !self.resolvable(query)? || !self.resolvable(target)? {
            return Ok(None);
        }
        let mut path = vec![query.to_string()];
        while path[path.len() - 1] != target && path.len() <= self.limit {
            let neighbours = self.neighbours(&path[path.len() - 1])?;
            if neighbours.iter().any(|n| n == target) {
                path.push(target.to_string());
                break;
            }
            let mut best: Option<(f64, String)> = None;
            for n in neighbours.into_iter().filter(|n| !path.contains(n)) {
                let d = self.distance(&n, target)?;
                let closer = best.as_ref().map_or(true, |(bd, bn)| {
                    d.total_cmp(bd).then_with(|| n.cmp(bn)).is_lt()
                });
                if closer {
                    best = Some((d, n));
                }
            }
            match best {
                Some((_, n)) => path.push(n),
                None => break,
            }
        }
        Ok(Some(path))
    }

    fn shortest(&mut self, query: &str, target: &str) -> Result<Option<Vec<String>>> {
        let by_distance = self.resolvable(target)?;
        let mut paths = VecDeque::from([vec![query.to_string()]]);
        let mut seen = HashSet::new();
        seen.insert(query.to_string());
        while let Some(mut current) = paths.pop_front() {
            let neighbours = self.neighbours(&current[current.len() - 1])?;
            if neighbours.iter().any(|n| n == target) {
                current.push(target.to_string());
                return Ok(Some(current));
            }
            if current.len() >= self.limit {
                continue;
            }
            let mut ranked = Vec::with_capacity(neighbours.len());
            for n in neighbours {
                let d = if by_distance {
                    self.distance(&n, target)?
                } else {
                    0.
                };
                ranked.push((d, n));
            }
            // Stable, so recall order breaks ties.
            ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
            for (_, n) in ranked {
                if seen.insert(n.clone()) {
                    let mut next = current.clone();
                    next.push(n);
                    paths.push_back(next);
                }
            }
        }
        Ok(None)
    }

    /// Gets the recalled neighbours, or none if the glyph cannot be looked up.
    fn neighbours(&mut self, glyph: &str) -> Result<Vec<String>> {
        if let Some(neighbours) = self.neighbours.get(glyph) {
            return Ok(neighbours.clone());
        }
        let neighbours = match self.service.query(glyph, self.recalled, None) {
            Ok(entries) => entries.into_iter().map(|e| e.glyph).collect(),
            Err(SimsearchError::NotFound(_) | SimsearchError::DataIntegrity(_)) => vec![],
            Err(e) => return Err(e),
        };
        self.neighbours.insert(glyph.to_string(), neighbours.clone());
        Ok(neighbours)
    }

    /// Checks if the glyph can be aligned, caching its strokes.
    fn resolvable(&mut self, glyph: &str) -> Result<bool> {
        if !self.strokes.contains_key(glyph) {
            let strokes = self.service.strokes(glyph)?;
            self.strokes.insert(glyph.to_string(), strokes);
        }
        Ok(matches!(self.strokes.get(glyph), Some(Some(_))))
    }

    /// Scores two glyphs, unusable ones being infinitely far.
    fn distance(&mut self, a: &str, b: &str) -> Result<f64> {
        if !self.resolvable(a)? || !self.resolvable(b)? {
            return Ok(f64::INFINITY);
        }
        match (self.strokes.get(a), self.strokes.get(b)) {
            (Some(Some(a)), Some(Some(b))) => Ok(self.service.aligner().align(a, b)),
            _ => Ok(f64::INFINITY),
        }
    }
}

/// Loads search pairs from lines of a query glyph followed by one or more targets.
///
/// Empty lines and lines starting with `#` are ignored.
pub fn load_search_pairs<R>(rdr: R) -> io::Result<Vec<(String, String)>>
where
    R: Read,
{
    let mut pairs = vec![];
    for line in BufReader::new(rdr).lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        if let Some(query) = tokens.next() {
            for target in tokens {
                pairs.push((query.to_string(), target.to_string()));
            }
        }
    }
    Ok(pairs)
}

/// Writes traces in the tab-separated trace format.
///
/// Each line holds the query, the target in parentheses unless reached, and the intermediate
/// glyphs in brackets separated by spaces, or `None` when no step was made.
pub fn save_traces<W>(traces: &[Trace], mut wtr: W) -> io::Result<()>
where
    W: Write,
{
    writeln!(wtr, "#query\ttarget\tvia")?;
    for trace in traces {
        match &trace.path {
            Some(path) if trace.is_success() => {
                let via = &path[1.min(path.len() - 1)..path.len() - 1];
                writeln!(wtr, "{}\t{}\t[{}]", trace.query, trace.target, via.join(" "))?;
            }
            Some(path) => {
                let via = path.get(1..).unwrap_or_default();
                writeln!(wtr, "{}\t({})\t[{}]", trace.query, trace.target, via.join(" "))?;
            }
            None => writeln!(wtr, "{}\t({})\tNone", trace.query, trace.target)?,
        }
    }
    Ok(())
}

/// Reads traces written by [`save_traces`].
pub fn load_traces<R>(rdr: R) -> io::Result<Vec<Trace>>
where
    R: Read,
{
    let invalid = |line: usize, msg: &str| {
        io::Error::new(ErrorKind::InvalidData, format!("line {line}: {msg}"))
    };
    let mut lines = BufReader::new(rdr).lines();
    let header = lines.next().transpose()?;
    if !header.map_or(false, |h| h.starts_with('#')) {
        return Err(invalid(1, "missing header"));
    }

    let mut traces = vec![];
    for (i, line) in lines.enumerate() {
        let line = line?;
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        let cols: Vec<_> = line.split('\t').collect();
        if cols.len() != 3 {
            return Err(invalid(i + 2, "expected three tab-separated columns"));
        }
        let (query, target, via) = (cols[0], cols[1], cols[2]);
        let (target, reached) = match target.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
            Some(t) => (t, false),
            None => (target, true),
        };
        let path = if via == "None" {
            None
        } else {
            let via = via
                .strip_prefix('[')
                .and_then(|v| v.strip_suffix(']'))
                .ok_or_else(|| invalid(i + 2, "malformed path"))?;
            let mut path = vec![query.to_string()];
            path.extend(via.split_whitespace().map(str::to_string));
            if reached {
                path.push(target.to_string());
            }
            Some(path)
        };
        traces.push(Trace {
            query: query.to_string(),
            target: target.to_string(),
            path,
        });
    }
    Ok(traces)
}

/// Summary statistics of simulated searches.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PathStats {
    /// Number of traces.
    pub num_traces: usize,
    /// Number of traces reaching their target.
    pub num_successes: usize,
    /// Mean number of steps, failures counting as the limit.
    pub mean_length: f64,
    /// Population standard deviation of the number of steps.
    pub std_length: f64,
}

impl PathStats {
    /// Gets the ratio of successful searches.
    pub fn success_rate(&self) -> f64 {
        if self.num_traces == 0 {
            0.
        } else {
            self.num_successes as f64 / self.num_traces as f64
        }
    }
}

/// Summarizes traces, counting each failed search as `limit` steps.
pub fn evaluate(traces: &[Trace], limit: usize) -> PathStats {
    if traces.is_empty() {
        return PathStats::default();
    }
    let lengths: Vec<f64> = traces
        .iter()
        .map(|t| match &t.path {
            Some(path) if t.is_success() => (path.len() - 1) as f64,
            _ => limit as f64,
        })
        .collect();
    let n = lengths.len() as f64;
    let mean_length = lengths.iter().sum::<f64>() / n;
    let var = lengths.iter().map(|l| (l - mean_length).powi(2)).sum::<f64>() / n;
    PathStats {
        num_traces: traces.len(),
        num_successes: traces.iter().filter(|t| t.is_success()).count(),
        mean_length,
        std_length: var.sqrt(),
    }
}
