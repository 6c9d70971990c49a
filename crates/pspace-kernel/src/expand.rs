//! Expansion of a configuration into concrete parameter sets.
//!
//! Each block contributes the cartesian product of its value lists, taken in
//! declaration order with the first parameter varying slowest. Every product
//! becomes a [`ParameterSet`] keyed by its rendered datafile name.

use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use pspace_types::{canonical_float, Datafile, Parameter, ParameterSet, Value};
use thiserror::Error;

use crate::arithmetic::{round_to_int, EvalError};
use crate::config::{Configuration, ParameterSpaceBlock};
use crate::paths;
use crate::template::{format_template, TemplateError};

/// Suffix appended to every rendered datafile name.
pub const DATAFILE_SUFFIX: &str = ".h5";

/// Expanded parameter sets by key, iterated in key order.
pub type ParameterSpace = BTreeMap<String, ParameterSet>;

#[derive(Debug, Error)]
pub enum ExpandError {
    #[error("PSPACE block at line {line}, {params}: {source}")]
    Datafile {
        line: usize,
        params: String,
        #[source]
        source: TemplateError,
    },
}

/// Expand every block and resolve key collisions.
///
/// When a key is produced twice, the existing entry is kept if
/// `existing.accuracy OP new.accuracy` holds under the configured operator,
/// and replaced otherwise. Under `<=` the smaller target survives and ties
/// keep the earlier entry. Any evaluation error aborts the expansion.
pub fn expand(conf: &Configuration) -> Result<ParameterSpace, ExpandError> {
    let mut psets = ParameterSpace::new();

    for block in &conf.blocks {
        for values in product(conf, block) {
            let pset = build(conf, block, values)?;
            match psets.entry(pset.key().to_string()) {
                Entry::Vacant(slot) => {
                    slot.insert(pset);
                }
                Entry::Occupied(mut slot) => {
                    let existing = slot.get().accuracy();
                    if conf.op.holds(existing, pset.accuracy()) {
                        tracing::debug!(
                            key = %slot.key(),
                            kept = existing,
                            dropped = pset.accuracy(),
                            "datafile collision, keeping earlier target"
                        );
                    } else {
                        tracing::debug!(
                            key = %slot.key(),
                            kept = pset.accuracy(),
                            dropped = existing,
                            "datafile collision, replacing earlier target"
                        );
                        slot.insert(pset);
                    }
                }
            }
        }
    }

    tracing::debug!(count = psets.len(), blocks = conf.blocks.len(), "expanded parameter space");
    Ok(psets)
}

/// Number of distinct datafiles the configuration expands to.
pub fn cardinality(conf: &Configuration) -> Result<usize, ExpandError> {
    Ok(expand(conf)?.len())
}

/// Parameter sets ordered by one parameter's value, ties in key order.
///
/// Sets lacking the parameter go last.
pub fn sorted_by_parameter<'a>(
    psets: &'a ParameterSpace,
    name: &str,
    reverse: bool,
) -> Vec<&'a ParameterSet> {
    let mut out: Vec<&ParameterSet> = psets.values().collect();
    out.sort_by(|a, b| {
        let ord = match (a.get(name), b.get(name)) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => return Ordering::Less,
            (None, Some(_)) => return Ordering::Greater,
            (None, None) => return Ordering::Equal,
        };
        if reverse {
            ord.reverse()
        } else {
            ord
        }
    });
    out
}

/// All value tuples of a block, first parameter varying slowest.
fn product<'a>(conf: &'a Configuration, block: &'a ParameterSpaceBlock) -> Product<'a> {
    let lists: Vec<&[f64]> = conf
        .pnames
        .iter()
        .map(|name| block.values_of(name).unwrap_or(&[]))
        .collect();
    let done = lists.iter().any(|l| l.is_empty());
    Product {
        lists,
        indices: vec![0; conf.pnames.len()],
        done,
    }
}

/// Odometer over the per-parameter value lists.
struct Product<'a> {
    lists: Vec<&'a [f64]>,
    indices: Vec<usize>,
    done: bool,
}

impl Iterator for Product<'_> {
    type Item = Vec<f64>;

    fn next(&mut self) -> Option<Vec<f64>> {
        if self.done {
            return None;
        }
        let current = self
            .indices
            .iter()
            .zip(&self.lists)
            .map(|(&i, list)| list[i])
            .collect();

        // advance the last position first
        self.done = true;
        for pos in (0..self.indices.len()).rev() {
            self.indices[pos] += 1;
            if self.indices[pos] < self.lists[pos].len() {
                self.done = false;
                break;
            }
            self.indices[pos] = 0;
        }
        Some(current)
    }
}

fn build(
    conf: &Configuration,
    block: &ParameterSpaceBlock,
    values: Vec<f64>,
) -> Result<ParameterSet, ExpandError> {
    let params = conf
        .pnames
        .iter()
        .zip(values)
        .map(|(name, value)| Parameter {
            name: name.clone(),
            value,
        })
        .collect();
    let pset = ParameterSet::new(params, block.accuracy);

    let datafile = datafile(conf, &pset).map_err(|source| ExpandError::Datafile {
        line: block.line,
        params: describe(&pset),
        source,
    })?;
    Ok(pset.with_datafile(datafile))
}

/// Render the datafile identity of a parameter set.
fn datafile(conf: &Configuration, pset: &ParameterSet) -> Result<Datafile, TemplateError> {
    let args = conf
        .datafile
        .arguments(pset)?
        .into_iter()
        .zip(&conf.datafile.values)
        .map(|(value, expr)| {
            round_value(value).map_err(|source| TemplateError::Eval {
                expr: expr.source().to_string(),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let file = format_template(&conf.datafile.template, &args)? + DATAFILE_SUFFIX;
    let expanded = paths::expand_tilde(&file, &conf.home);
    let abspath = paths::absolutize(&expanded, &conf.workdir);
    let relpath = paths::relative_path(&abspath, &conf.workdir);

    Ok(Datafile {
        key: expanded.to_string_lossy().into_owned(),
        file,
        relpath,
        abspath,
    })
}

/// Round a datafile value to the nearest integer, ties to even.
fn round_value(value: Value) -> Result<Value, EvalError> {
    match value {
        Value::Int(_) => Ok(value),
        Value::Bool(b) => Ok(Value::Int(b as i64)),
        Value::Float(x) => round_to_int(x),
        Value::String(_) => Err(EvalError::OperandType {
            op: "round",
            operand: "str",
        }),
    }
}

fn describe(pset: &ParameterSet) -> String {
    pset.parameters()
        .iter()
        .map(|p| format!("{}={}", p.name, canonical_float(p.value)))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigParser;

    fn conf(blocks: &str) -> Configuration {
        let text = format!(
            "DECLARE A B\n\
             WORKDIR /work\n\
             DATAFILE a%d_b%d\n\
             DATAFILE_VALUES A B\n\
             CMD_EXEC x\nCMD_FILE x\nCMD_CHECKFILE x\nCMD_ACC x\n\
             {blocks}"
        );
        ConfigParser::new("/work/pspace.conf")
            .with_home("/home/alice")
            .parse(&text)
            .expect("valid configuration")
    }

    #[test]
    fn product_varies_last_parameter_fastest() {
        let conf = conf("PSPACE:\n  PARAM A 1 2\n  PARAM B 7 8 9\n  ACC 1\n");
        let tuples: Vec<Vec<f64>> = product(&conf, &conf.blocks[0]).collect();
        assert_eq!(
            tuples,
            vec![
                vec![1.0, 7.0],
                vec![1.0, 8.0],
                vec![1.0, 9.0],
                vec![2.0, 7.0],
                vec![2.0, 8.0],
                vec![2.0, 9.0],
            ]
        );
    }

    #[test]
    fn empty_value_list_yields_nothing() {
        let conf = conf("PSPACE:\n  PARAM A 1 2\n  PARAM B 5:1\n  ACC 1\n");
        assert_eq!(product(&conf, &conf.blocks[0]).count(), 0);
        assert_eq!(cardinality(&conf).expect("expand"), 0);
    }

    #[test]
    fn datafile_values_round_half_to_even() {
        let conf = conf("PSPACE:\n  PARAM A 2.5\n  PARAM B 3.5\n  ACC 1\n");
        let psets = expand(&conf).expect("expand");
        assert_eq!(psets.keys().collect::<Vec<_>>(), vec!["a2_b4.h5"]);
    }

    #[test]
    fn derived_paths() {
        let conf = conf("PSPACE:\n  PARAM A 1\n  PARAM B 2\n  ACC 1\n");
        let psets = expand(&conf).expect("expand");
        let pset = &psets["a1_b2.h5"];
        let datafile = pset.datafile().expect("datafile attached");
        assert_eq!(datafile.file, "a1_b2.h5");
        assert_eq!(datafile.abspath, std::path::PathBuf::from("/work/a1_b2.h5"));
        assert_eq!(datafile.relpath, std::path::PathBuf::from("a1_b2.h5"));
        assert_eq!(pset.accuracy(), 1.0);
    }

    #[test]
    fn sort_by_parameter() {
        let conf = conf("PSPACE:\n  PARAM A 3 1 2\n  PARAM B 0\n  ACC 1\n");
        let psets = expand(&conf).expect("expand");
        let order: Vec<f64> = sorted_by_parameter(&psets, "A", false)
            .iter()
            .filter_map(|p| p.get("A"))
            .collect();
        assert_eq!(order, vec![1.0, 2.0, 3.0]);
        let order: Vec<f64> = sorted_by_parameter(&psets, "A", true)
            .iter()
            .filter_map(|p| p.get("A"))
            .collect();
        assert_eq!(order, vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn datafile_errors_name_the_block() {
        let text = "DECLARE A\nDATAFILE f%s\nDATAFILE_VALUES ACC\n\
                    CMD_EXEC x\nCMD_FILE x\nCMD_CHECKFILE x\nCMD_ACC x\n\
                    PSPACE:\n  PARAM A 1\n  ACC 1\n";
        let mut conf = ConfigParser::new("/w/pspace.conf")
            .with_home("/h")
            .parse(text)
            .expect("valid configuration");
        assert_eq!(cardinality(&conf).expect("ACC rounds fine"), 1);

        conf.datafile.values = vec![crate::arithmetic::Expr::parse("FILE").expect("compile")];
        let err = expand(&conf).expect_err("FILE is unbound before naming");
        assert!(err.to_string().starts_with("PSPACE block at line 8, A=1.0: "), "{err}");
    }
}
