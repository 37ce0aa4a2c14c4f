//! Offline rendering through a program host
//!
//! Compiles a program and drives block computation into memory or a 16-bit
//! WAV file. Programs that read input channels are fed silence; everything
//! else goes through exactly the same compute path a real-time caller uses.

use std::path::Path;

use crate::factory::Backend;
use crate::host::ProgramHost;

/// Configuration for rendering audio
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub sample_rate: u32,
    pub block_size: usize,
    /// Duration in seconds
    pub duration: f32,
    /// Output gain applied after rendering
    pub master_gain: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            block_size: 512,
            duration: 1.0,
            master_gain: 1.0,
        }
    }
}

pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Render a program to per-channel sample buffers.
    pub fn render_to_buffers(
        &self,
        source: &str,
        backend: Backend,
    ) -> Result<Vec<Vec<f32>>, String> {
        let block_size = self.config.block_size.max(1);
        let mut host = ProgramHost::new(backend, self.config.sample_rate);
        host.compile(source).map_err(|e| e.to_string())?;

        let total = (self.config.duration * self.config.sample_rate as f32) as usize;
        let mut buffers = vec![vec![0.0f32; total]; host.num_outputs()];

        let silence = vec![0.0f32; block_size];
        let inputs: Vec<&[f32]> = vec![&silence; host.num_inputs()];

        let mut position = 0;
        while position < total {
            let frames = block_size.min(total - position);
            let mut outputs: Vec<&mut [f32]> = buffers
                .iter_mut()
                .map(|b| &mut b[position..position + frames])
                .collect();
            host.compute(frames, &inputs, &mut outputs);
            position += frames;
        }

        if (self.config.master_gain - 1.0).abs() > f32::EPSILON {
            for buffer in &mut buffers {
                for sample in buffer.iter_mut() {
                    *sample *= self.config.master_gain;
                }
            }
        }

        Ok(buffers)
    }

    /// Render a program to a WAV file and return summary statistics.
    pub fn render_to_file(
        &self,
        source: &str,
        backend: Backend,
        output_path: &Path,
    ) -> Result<RenderStats, String> {
        let buffers = self.render_to_buffers(source, backend)?;
        let stats = RenderStats::from_channels(&buffers, self.config.sample_rate);
        self.write_wav(output_path, &buffers)?;
        Ok(stats)
    }

    fn write_wav(&self, path: &Path, buffers: &[Vec<f32>]) -> Result<(), String> {
        let spec = hound::WavSpec {
            channels: buffers.len() as u16,
            sample_rate: self.config.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = hound::WavWriter::create(path, spec)
            .map_err(|e| format!("Failed to create WAV file: {e}"))?;

        let frames = buffers.first().map_or(0, |b| b.len());
        for i in 0..frames {
            for channel in buffers {
                let clamped = channel[i].clamp(-1.0, 1.0);
                writer
                    .write_sample((clamped * 32767.0) as i16)
                    .map_err(|e| format!("Failed to write sample: {e}"))?;
            }
        }

        writer
            .finalize()
            .map_err(|e| format!("Failed to finalize WAV: {e}"))?;

        Ok(())
    }
}

/// Statistics about rendered audio
#[derive(Debug, Clone)]
pub struct RenderStats {
    pub duration: f32,
    pub channels: usize,
    pub sample_count: usize,
    pub rms: f32,
    pub peak: f32,
}

impl RenderStats {
    fn from_channels(buffers: &[Vec<f32>], sample_rate: u32) -> Self {
        let frames = buffers.first().map_or(0, |b| b.len());
        let sample_count: usize = buffers.iter().map(|b| b.len()).sum();

        let sum_squares: f32 = buffers
            .iter()
            .flat_map(|b| b.iter())
            .map(|s| s * s)
            .sum();
        let rms = if sample_count > 0 {
            (sum_squares / sample_count as f32).sqrt()
        } else {
            0.0
        };
        let peak = buffers
            .iter()
            .flat_map(|b| b.iter())
            .map(|s| s.abs())
            .fold(0.0f32, f32::max);

        Self {
            duration: frames as f32 / sample_rate as f32,
            channels: buffers.len(),
            sample_count,
            rms,
            peak,
        }
    }

    pub fn print_summary(&self) {
        println!("Render statistics:");
        println!("  Duration:  {:.3} seconds", self.duration);
        println!("  Channels:  {}", self.channels);
        println!("  Samples:   {}", self.sample_count);
        println!("  RMS:       {:.3}", self.rms);
        println!("  Peak:      {:.3}", self.peak);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_sine_wave_rms() {
        let config = RenderConfig {
            duration: 1.0,
            ..Default::default()
        };
        let renderer = Renderer::new(config);
        let buffers = renderer
            .render_to_buffers("out: sin 440 >> mul 0.5", Backend::Compiled)
            .expect("Failed to render");

        assert_eq!(buffers.len(), 1);
        assert_eq!(buffers[0].len(), 44100);

        let stats = RenderStats::from_channels(&buffers, 44100);
        assert!(
            stats.rms > 0.3 && stats.rms < 0.4,
            "RMS should be ~0.35 for 0.5 amplitude sine, got {}",
            stats.rms
        );
    }

    #[test]
    fn test_block_size_does_not_change_output() {
        let source = "out: sin 220 >> lpf 2000 0.7 >> mul 0.4";
        let mut config = RenderConfig {
            duration: 0.25,
            ..Default::default()
        };

        config.block_size = 512;
        let coarse = Renderer::new(config.clone())
            .render_to_buffers(source, Backend::Compiled)
            .unwrap();

        config.block_size = 64;
        let fine = Renderer::new(config)
            .render_to_buffers(source, Backend::Compiled)
            .unwrap();

        assert_eq!(coarse[0].len(), fine[0].len());
        for (a, b) in coarse[0].iter().zip(fine[0].iter()) {
            assert!((a - b).abs() < 1e-6, "state must carry across blocks");
        }
    }

    #[test]
    fn test_render_to_file_writes_wav() {
        let config = RenderConfig {
            duration: 0.1,
            ..Default::default()
        };
        let renderer = Renderer::new(config);
        let path = std::env::temp_dir().join("soliton_render_test.wav");

        let stats = renderer
            .render_to_file("out: sin 440 >> mul 0.5, sin 441 >> mul 0.5", Backend::Compiled, &path)
            .expect("Failed to render to file");

        assert_eq!(stats.channels, 2);
        assert!(stats.peak > 0.0);
        assert!(path.exists());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_render_reports_compile_failure() {
        let renderer = Renderer::new(RenderConfig::default());
        let err = renderer
            .render_to_buffers("out: wobble 3", Backend::Compiled)
            .unwrap_err();
        assert!(err.contains("wobble"));
    }
}
