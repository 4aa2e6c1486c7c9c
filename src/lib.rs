pub mod config;
pub mod debug;
pub mod dsp;

pub use crate::config::{ConfigError, FilterConfig};
pub use crate::debug::{diagnostics_channel, BlockReport, DiagnosticsReader, DiagnosticsTap};
pub use crate::dsp::{BlockStream, Int24, MultirateFilter};

use assert_no_alloc::permit_alloc;
use nih_plug::prelude::*;
use std::sync::{Arc, Mutex};

// Unread block reports held for the background drain.
const DIAGNOSTIC_QUEUE_BLOCKS: usize = 256;
// Blocks between drain requests sent to the background executor.
const DIAGNOSTIC_DRAIN_INTERVAL_BLOCKS: u64 = 32;

#[derive(Params)]
struct SplitbandParams {
    #[id = "diagnostics"]
    pub diagnostics: BoolParam,
}

/// Work handed off the audio thread.
pub enum PluginTask {
    DrainDiagnostics,
}

// -----------------------------------------------------------------------------
// PLUGIN STRUCT
// -----------------------------------------------------------------------------
struct SplitbandPlugin {
    params: Arc<SplitbandParams>,
    // Built in initialize() once the host sample rate is known
    stream: Option<BlockStream>,
    diagnostics: Arc<Mutex<Option<DiagnosticsReader>>>,
    last_drain_block: u64,
}

impl Default for SplitbandPlugin {
    fn default() -> Self {
        Self {
            params: Arc::new(SplitbandParams {
                diagnostics: BoolParam::new("Diagnostics", false),
            }),
            stream: None,
            diagnostics: Arc::new(Mutex::new(None)),
            last_drain_block: 0,
        }
    }
}

impl Plugin for SplitbandPlugin {
    const NAME: &'static str = "Splitband";
    const VENDOR: &'static str = "Andrzej Marczewski";
    const URL: &'static str = "";
    const EMAIL: &'static str = "";
    const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[AudioIOLayout {
        main_input_channels: NonZeroU32::new(1),
        main_output_channels: NonZeroU32::new(1),
        ..AudioIOLayout::const_default()
    }];

    const MIDI_INPUT: MidiConfig = MidiConfig::None;
    const SAMPLE_ACCURATE_AUTOMATION: bool = false;

    type SysExMessage = ();
    type BackgroundTask = PluginTask;

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    fn initialize(
        &mut self,
        _audio_io_layout: &AudioIOLayout,
        buffer_config: &BufferConfig,
        context: &mut impl InitContext<Self>,
    ) -> bool {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let diagnostics_on = self.params.diagnostics.value();
            let mut config = FilterConfig::default();
            config.diagnostics = diagnostics_on;

            let built = permit_alloc(|| {
                MultirateFilter::from_config(config, buffer_config.sample_rate).map(|mut filter| {
                    let reader = filter.attach_diagnostics(DIAGNOSTIC_QUEUE_BLOCKS);
                    (BlockStream::new(filter), reader)
                })
            });

            let (stream, reader) = match built {
                Ok(parts) => parts,
                Err(err) => {
                    log::error!("failed to open filter: {}", err);
                    return false;
                }
            };

            if let Ok(mut slot) = self.diagnostics.lock() {
                *slot = Some(reader);
            }
            context.set_latency_samples(stream.latency_samples() as u32);
            self.stream = Some(stream);
            self.last_drain_block = 0;

            true
        }))
        .unwrap_or(false)
    }

    fn task_executor(&mut self) -> TaskExecutor<Self> {
        let diagnostics = self.diagnostics.clone();
        Box::new(move |task| match task {
            PluginTask::DrainDiagnostics => {
                if let Ok(mut slot) = diagnostics.lock() {
                    if let Some(reader) = slot.as_mut() {
                        reader.log_pending();
                    }
                }
            }
        })
    }

    fn process(
        &mut self,
        buffer: &mut Buffer,
        _aux: &mut AuxiliaryBuffers,
        context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.process_internal(buffer, context)
        }))
        .unwrap_or(ProcessStatus::Normal)
    }

    fn reset(&mut self) {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            if let Some(stream) = self.stream.as_mut() {
                stream.reset();
            }
            self.last_drain_block = 0;
        }))
        .unwrap_or(());
    }
}

impl SplitbandPlugin {
    fn process_internal(
        &mut self,
        buffer: &mut Buffer,
        context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        let Some(stream) = self.stream.as_mut() else {
            return ProcessStatus::Normal;
        };

        let diagnostics_on = self.params.diagnostics.value();
        stream.filter_mut().set_diagnostics_enabled(diagnostics_on);

        // Mono layout: a single channel slice
        for channel in buffer.as_slice().iter_mut() {
            stream.process_slice(channel);
        }

        let blocks = stream.filter().blocks_processed();
        if blocks < self.last_drain_block {
            self.last_drain_block = 0;
        }
        if diagnostics_on && blocks - self.last_drain_block >= DIAGNOSTIC_DRAIN_INTERVAL_BLOCKS {
            self.last_drain_block = blocks;
            context.execute_background(PluginTask::DrainDiagnostics);
        }

        ProcessStatus::Normal
    }
}

impl ClapPlugin for SplitbandPlugin {
    const CLAP_ID: &'static str = "com.andrzej.splitband";
    const CLAP_DESCRIPTION: Option<&'static str> =
        Some("Multirate band-split filter with high-frequency shaped dither");
    const CLAP_MANUAL_URL: Option<&'static str> = None;
    const CLAP_SUPPORT_URL: Option<&'static str> = None;
    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Filter,
        ClapFeature::Mono,
    ];
}

impl Vst3Plugin for SplitbandPlugin {
    const VST3_CLASS_ID: [u8; 16] = *b"SplitbandDither1";
    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] =
        &[Vst3SubCategory::Fx, Vst3SubCategory::Filter];
}

nih_export_clap!(SplitbandPlugin);
nih_export_vst3!(SplitbandPlugin);
