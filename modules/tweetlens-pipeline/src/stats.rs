/// Counters from one pipeline run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub sources_requested: u32,
    pub sources_failed: u32,
    pub fetched: u32,
    pub stale: u32,
    pub reposts: u32,
    pub link_free: u32,
    pub extraction_failures: u32,
    pub summary_failures: u32,
    pub intention_failures: u32,
    /// Items whose two tasks both failed.
    pub unannotated: u32,
    pub annotated: u32,
    pub archived: bool,
    pub persisted: u32,
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Tweetlens Run Complete ===")?;
        writeln!(
            f,
            "Sources:            {} ({} failed)",
            self.sources_requested, self.sources_failed
        )?;
        writeln!(f, "Posts fetched:      {}", self.fetched)?;
        writeln!(f, "Outside window:     {}", self.stale)?;
        writeln!(f, "Reposts dropped:    {}", self.reposts)?;
        writeln!(f, "Link-free dropped:  {}", self.link_free)?;
        writeln!(f, "Extraction errors:  {}", self.extraction_failures)?;
        writeln!(f, "\nAnnotation:")?;
        writeln!(f, "  Summary failed:   {}", self.summary_failures)?;
        writeln!(f, "  Intention failed: {}", self.intention_failures)?;
        writeln!(f, "  Both failed:      {}", self.unannotated)?;
        writeln!(f, "  Annotated:        {}", self.annotated)?;
        writeln!(f, "\nArchived:           {}", if self.archived { "yes" } else { "no" })?;
        writeln!(f, "Rows persisted:     {}", self.persisted)?;
        Ok(())
    }
}
