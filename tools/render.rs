use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use splitband::{FilterConfig, Int24, MultirateFilter};
use std::path::PathBuf;

const USAGE: &str = "usage: splitband_render <input.wav> <output.wav> [config.json]";
const DIAGNOSTIC_QUEUE_BLOCKS: usize = 64;

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let input = args.next().map(PathBuf::from).context(USAGE)?;
    let output = args.next().map(PathBuf::from).context(USAGE)?;
    let config = match args.next() {
        Some(path) => FilterConfig::load(&path)?,
        None => FilterConfig::default(),
    };

    let reader = WavReader::open(&input)
        .with_context(|| format!("failed to open input WAV '{}'", input.display()))?;
    let spec = reader.spec();
    if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 24 || spec.channels != 1
    {
        anyhow::bail!("only mono 24-bit integer WAV input is supported");
    }

    let mut filter = MultirateFilter::from_config(config.clone(), spec.sample_rate as f32)?;
    let mut diagnostics = if config.diagnostics {
        Some(filter.attach_diagnostics(DIAGNOSTIC_QUEUE_BLOCKS))
    } else {
        None
    };

    let samples = reader
        .into_samples::<i32>()
        .collect::<Result<Vec<i32>, _>>()
        .with_context(|| format!("failed to decode '{}'", input.display()))?;

    let out_spec = WavSpec {
        channels: 1,
        sample_rate: spec.sample_rate,
        bits_per_sample: 24,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(&output, out_spec)
        .with_context(|| format!("failed to create output WAV '{}'", output.display()))?;

    let block_len = filter.block_len();
    let mut in_block = vec![Int24::ZERO; block_len];
    let mut out_block = vec![Int24::ZERO; block_len];
    let mut peak_in = 0i32;
    let mut peak_out = 0i32;

    // The tail is zero-padded to a whole block
    for chunk in samples.chunks(block_len) {
        for (slot, &s) in in_block
            .iter_mut()
            .zip(chunk.iter().chain(std::iter::repeat(&0)))
        {
            *slot = Int24::from_value(s);
            peak_in = peak_in.max(s.saturating_abs());
        }
        filter.process(&in_block, &mut out_block);
        for s in out_block.iter() {
            writer.write_sample(s.value())?;
            peak_out = peak_out.max(s.value().saturating_abs());
        }
        if let Some(reader) = diagnostics.as_mut() {
            reader.drain(|report| println!("{}", report));
        }
    }
    writer.finalize()?;

    println!("Render summary for '{}':", input.display());
    println!("  sample rate      : {} Hz", spec.sample_rate);
    println!("  blocks processed : {}", filter.blocks_processed());
    println!("  peak in / out    : {} / {}", peak_in, peak_out);
    if let Some(reader) = diagnostics.as_ref() {
        println!("  reports dropped  : {}", reader.dropped());
    }
    Ok(())
}
