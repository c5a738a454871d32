use anyhow::{Context, Result};
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Generate a mock PSM quantitation table for testing the pipeline.
///
/// The table mimics label-free search-engine output: one row per spectral
/// match, a peptide sequence, a (possibly shared, `;`-delimited) protein
/// assignment, an identification score, and one intensity column per
/// sample.
pub fn run(output: PathBuf, n_psms: usize, n_samples: usize) -> Result<()> {
    info!("Generating {} mock PSMs over {} samples", n_psms, n_samples);

    let peptides = [
        ("AQFEELCSDLFR", "P02768"),
        ("LVNEVTEFAK", "P02768"),
        ("YLYEIAR", "P02768;P02769"),
        ("DLGEEHFK", "P02769"),
        ("HLVDEPQNLIK", "P02769"),
        ("TCVADESHAGCEK", "P00711"),
    ];

    let file = File::create(&output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut writer = BufWriter::new(file);

    write!(writer, "psm_id\tsequence\tprotein\tscore\tcharge")?;
    for sample in 0..n_samples {
        write!(writer, "\tsample_{}", sample + 1)?;
    }
    writeln!(writer)?;

    // Small deterministic LCG so runs are reproducible without an RNG crate.
    let mut state: u64 = 0x5DEECE66D;
    let mut next = move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 33) as f64 / (1u64 << 31) as f64
    };

    for i in 0..n_psms {
        let (sequence, protein) = peptides[i % peptides.len()];
        let score = 0.3 + 0.7 * next();
        let charge = 2 + (i % 3) as i64;
        write!(
            writer,
            "psm{}\t{}\t{}\t{:.3}\t{}",
            i + 1,
            sequence,
            protein,
            score,
            charge
        )?;
        for _ in 0..n_samples {
            if next() < 0.05 {
                write!(writer, "\tNA")?;
            } else {
                write!(writer, "\t{:.1}", 1000.0 + 9000.0 * next())?;
            }
        }
        writeln!(writer)?;
    }
    writer.flush()?;

    info!("Wrote {}", output.display());
    println!(
        "Wrote {} PSMs x {} samples to {}",
        n_psms,
        n_samples,
        output.display()
    );
    println!(
        "Try: mzquant summarize {} --quant-cols {} --id-col psm_id --group-by sequence --group-by protein",
        output.display(),
        (0..n_samples)
            .map(|s| format!("sample_{}", s + 1))
            .collect::<Vec<_>>()
            .join(",")
    );
    Ok(())
}
