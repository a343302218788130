use clap::Parser;
use hctree::{
    Condition, HcTree, HcTreeError, PartitionEngine, PartitionMode, PartitionParams,
};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Cut a hierarchical clustering into clusters and print them.
#[derive(Parser, Debug)]
#[command(name = "hctree", version, about)]
struct Cli {
    /// CSV file of `child1,child2,value` merges, one per line, leaves first numbered from 0
    merges: PathBuf,

    /// Number of clusters to cut the tree into
    #[arg(short, long, default_value_t = 6)]
    clusters: usize,

    /// Keep clusters made only of leaves whole
    #[arg(long)]
    exclude_leaves: bool,

    /// Cut by tree level instead of merge value
    #[arg(long)]
    by_level: bool,

    /// Number of leaves, for merge lists that leave the tree as a forest. Defaults to one more
    /// than the number of merges, as in a fully merged binary tree
    #[arg(long)]
    leaves: Option<usize>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let contents = fs::read_to_string(&cli.merges)?;
    let merges = parse_merges(&contents)?;
    let tree = HcTree::from_merges(leaf_count(cli.leaves, merges.len()), &merges)?;
    info!(leaves = tree.num_leaves(), clusters = tree.num_clusters(), "tree built");

    let mut params = PartitionParams::builder().exclude_leaves(cli.exclude_leaves);
    if !tree.is_fully_merged() {
        let roots = tree.roots();
        if let Some(largest) = roots.iter().copied().max_by_key(|&id| (tree.size_of(id), id)) {
            warn!(
                roots = roots.len(),
                source = largest,
                "merges leave a forest, cutting the largest tree"
            );
            params = params.source(largest);
        }
    }
    let params = params.build();
    let mode = if cli.by_level {
        PartitionMode::HorizontalLevel
    } else {
        PartitionMode::HorizontalValue
    };
    let partition = PartitionEngine::with_params(&tree, params)
        .partition(mode, Condition::Count(cli.clusters))?;
    info!(entries = partition.len(), cut = partition.cut_value(), "partition found");

    println!("id,size,value");
    for entry in partition.entries() {
        let node = tree.node(entry.id)?;
        println!("{},{},{}", entry.id, node.size(), node.value());
    }
    Ok(())
}

fn parse_merges(contents: &str) -> Result<Vec<(usize, usize, f64)>, HcTreeError> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .enumerate()
        .map(|(n, line)| {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let malformed =
                || HcTreeError::StructureError(format!("merge {n} is malformed: {line}"));
            match fields.as_slice() {
                [left, right, value] => Ok((
                    left.parse().map_err(|_| malformed())?,
                    right.parse().map_err(|_| malformed())?,
                    value.parse().map_err(|_| malformed())?,
                )),
                _ => Err(malformed()),
            }
        })
        .collect()
}

fn leaf_count(declared: Option<usize>, n_merges: usize) -> usize {
    // A binary tree over n leaves has n - 1 merges
    declared.unwrap_or(n_merges + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_count_defaults_to_binary_tree() {
        assert_eq!(4, leaf_count(None, 3));
        assert_eq!(5, leaf_count(Some(5), 3));
    }

    #[test]
    fn forest_merge_list_builds_with_declared_leaves() {
        let merges = parse_merges("0,1,0.2\n2,3,0.3\n").unwrap();
        // 5 leaves: leaf 4 stays alone
        let tree: HcTree<f64> = HcTree::from_merges(leaf_count(Some(5), merges.len()), &merges)
            .unwrap();
        assert_eq!(5, tree.num_leaves());
        assert_eq!(vec![4, 5, 6], tree.roots());
        assert!(!tree.is_fully_merged());
        // Without the count, id 3 reads as the first cluster and the same lines chain up
        let chained: HcTree<f64> =
            HcTree::from_merges(leaf_count(None, merges.len()), &merges).unwrap();
        assert_eq!(3, chained.num_leaves());
        assert_eq!(Some(4), chained.root());
    }
}
