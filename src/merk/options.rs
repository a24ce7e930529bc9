/// Tuning knobs for a `Merk` handle.
#[derive(Clone, Debug)]
pub struct MerkOptions {
    /// After a commit, a node prunes its children from memory when
    /// `root_height - node_height >= levels_to_keep`. The default of 1 keeps
    /// the root and its children loaded.
    pub levels_to_keep: u8,

    /// Whether `apply` commits to the store right after a successful batch.
    pub auto_commit: bool,

    /// Minimum number of batch entries under a node for its left and right
    /// subtrees to be updated on separate rayon tasks. `usize::MAX` disables
    /// parallel application.
    pub parallel_threshold: usize,
}

impl Default for MerkOptions {
    fn default() -> Self {
        MerkOptions {
            levels_to_keep: 1,
            auto_commit: true,
            parallel_threshold: if num_cpus::get() > 1 {
                4096
            } else {
                usize::MAX
            },
        }
    }
}
