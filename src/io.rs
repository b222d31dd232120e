//! Problem and solution files.
//!
//! Input: `{ "name": …, "points": [ { "i": id, "x": …, "y": … }, … ] }`.
//! Output: `{ "type": "Solution", "instance_name": …, "meta":
//! { "comment": … }, "edgs": [ { "i": id1, "j": id2 }, … ] }`, one
//! entry per solution edge in unspecified order.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::geometry::Point;
use crate::problem::{OutputEdge, Problem};

#[derive(Deserialize)]
struct ProblemFile {
    name: String,
    points: Vec<PointEntry>,
}

#[derive(Deserialize)]
struct PointEntry {
    i: i64,
    x: f64,
    y: f64,
}

#[derive(Serialize)]
struct SolutionFile<'a> {
    #[serde(rename = "type")]
    ty: &'static str,
    instance_name: &'a str,
    meta: Meta,
    edgs: Vec<EdgeEntry>,
}

#[derive(Serialize)]
struct Meta {
    comment: &'static str,
}

#[derive(Serialize)]
struct EdgeEntry {
    i: i64,
    j: i64,
}

/// Reads a problem instance. Malformed content is reported with the
/// file path and aborts before any computation.
pub fn read_problem<P: AsRef<Path>>(path: P) -> Result<Problem, Error> {
    let path = path.as_ref();
    info!("reading problem from {}", path.display());
    let file = File::open(path).map_err(|e| Error::MalformedInput {
        path: path.to_owned(),
        detail: e.to_string(),
    })?;
    let parsed: ProblemFile =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| Error::MalformedInput {
            path: path.to_owned(),
            detail: e.to_string(),
        })?;
    let points = parsed
        .points
        .into_iter()
        .map(|p| Point::new(p.i, p.x, p.y))
        .collect();
    Ok(Problem::new(parsed.name, points))
}

/// Writes a solution edge set for `problem`.
pub fn write_solution<P: AsRef<Path>>(
    path: P,
    problem: &Problem,
    solution: &HashSet<OutputEdge>,
) -> Result<(), Error> {
    let path = path.as_ref();
    info!(
        "saving solution of {} edges for {} to {}",
        solution.len(),
        problem.name(),
        path.display()
    );
    let out = SolutionFile {
        ty: "Solution",
        instance_name: problem.name(),
        meta: Meta {
            comment: "generated by the convex layers peeling solver",
        },
        edgs: solution
            .iter()
            .map(|e| EdgeEntry {
                i: e.a().id(),
                j: e.b().id(),
            })
            .collect(),
    };
    let file = File::create(path).map_err(|e| Error::MalformedInput {
        path: path.to_owned(),
        detail: e.to_string(),
    })?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &out).map_err(|e| Error::MalformedInput {
        path: path.to_owned(),
        detail: e.to_string(),
    })?;
    writer.flush().map_err(|e| Error::MalformedInput {
        path: path.to_owned(),
        detail: e.to_string(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_roundtrip() {
        let dir = std::env::temp_dir();
        let in_path = dir.join("convex_layers_io_test.instance.json");
        let out_path = dir.join("convex_layers_io_test.solution.json");

        std::fs::write(
            &in_path,
            r#"{ "name": "tiny", "points": [
                { "i": 0, "x": 0.0, "y": 0.0 },
                { "i": 1, "x": 1.5, "y": 0.25 },
                { "i": 2, "x": 0.5, "y": 2.0 }
            ] }"#,
        )
        .unwrap();

        let problem = read_problem(&in_path).unwrap();
        assert_eq!(problem.name(), "tiny");
        assert_eq!(problem.points().len(), 3);
        assert_eq!(problem.points()[1], Point::new(1, 1.5, 0.25));

        let mut solution = HashSet::new();
        solution.insert(OutputEdge::new(problem.points()[0], problem.points()[1]));
        solution.insert(OutputEdge::new(problem.points()[1], problem.points()[2]));
        write_solution(&out_path, &problem, &solution).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out_path).unwrap()).unwrap();
        assert_eq!(raw["type"], "Solution");
        assert_eq!(raw["instance_name"], "tiny");
        assert_eq!(raw["edgs"].as_array().unwrap().len(), 2);

        std::fs::remove_file(&in_path).ok();
        std::fs::remove_file(&out_path).ok();
    }

    #[test]
    fn test_read_missing_field() {
        let dir = std::env::temp_dir();
        let in_path = dir.join("convex_layers_io_bad.instance.json");
        std::fs::write(&in_path, r#"{ "points": [] }"#).unwrap();
        match read_problem(&in_path) {
            Err(Error::MalformedInput { path, .. }) => assert_eq!(path, in_path),
            other => panic!("expected MalformedInput, got {:?}", other.map(|p| p.name().to_owned())),
        }
        std::fs::remove_file(&in_path).ok();
    }
}
