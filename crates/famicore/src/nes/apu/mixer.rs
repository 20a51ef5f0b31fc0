const BLIP_GAIN: f32 = 5.0; // tune somewhere approx. 4..16
const DAC_SCALE: f32 = 32768.0; // i16 range

/// Band-limited audio sink. Channels feed their raw levels in once per CPU
/// cycle; only the deltas reach the blip buffer, timestamped in CPU
/// cycles, so $4011 writes land with cycle resolution.
pub struct Mixer {
    blip: blip_buf::BlipBuf,
    cpu_hz: f64,
    sample_rate: u32,
    t_cpu: u32,
    last_dac: i32,
    scratch_i16: Vec<i16>,

    pub mute_pulse1: bool,
    pub mute_pulse2: bool,
    pub mute_triangle: bool,
    pub mute_noise: bool,
    pub mute_dmc: bool,
}

impl Mixer {
    pub fn new(cpu_hz: f64, sample_rate: u32, max_samples: usize) -> Mixer {
        let mut blip = blip_buf::BlipBuf::new(max_samples as u32);
        blip.set_rates(cpu_hz, sample_rate as f64);

        Mixer {
            blip,
            cpu_hz,
            sample_rate,
            t_cpu: 0,
            last_dac: 0,
            scratch_i16: vec![0; max_samples],
            mute_pulse1: false,
            mute_pulse2: false,
            mute_triangle: false,
            mute_noise: false,
            mute_dmc: false,
        }
    }

    pub fn reset(&mut self) {
        self.blip.clear();
        self.t_cpu = 0;
        self.last_dac = 0;
    }

    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        if self.sample_rate == sample_rate {
            return;
        }
        self.sample_rate = sample_rate;
        self.blip.set_rates(self.cpu_hz, sample_rate as f64);
        self.blip.clear();
        self.t_cpu = 0;
    }

    pub fn last_dac(&self) -> i32 {
        self.last_dac
    }

    pub fn set_last_dac(&mut self, dac: i32) {
        self.last_dac = dac;
    }

    /// One CPU cycle's worth of channel levels.
    pub fn step(&mut self, pulse1: u8, pulse2: u8, triangle: u8, noise: u8, dmc: u8) {
        let sample = self.mix(pulse1, pulse2, triangle, noise, dmc);
        let dac = (sample * DAC_SCALE * BLIP_GAIN).round() as i32;

        let delta = dac - self.last_dac;
        if delta != 0 {
            self.blip.add_delta(self.t_cpu, delta);
            self.last_dac = dac;
        }
        self.t_cpu += 1;
    }

    /// See: https://www.nesdev.org/wiki/APU_Mixer
    fn mix(&self, pulse1: u8, pulse2: u8, triangle: u8, noise: u8, dmc: u8) -> f32 {
        let pulse1 = if self.mute_pulse1 { 0.0 } else { pulse1 as f32 };
        let pulse2 = if self.mute_pulse2 { 0.0 } else { pulse2 as f32 };
        let triangle = if self.mute_triangle { 0.0 } else { triangle as f32 };
        let noise = if self.mute_noise { 0.0 } else { noise as f32 };
        let dmc = if self.mute_dmc { 0.0 } else { dmc as f32 };

        let pulse_sum = pulse1 + pulse2;
        let pulse_out = if pulse_sum > 0.0 {
            95.88 / (8128.0 / pulse_sum + 100.0)
        } else {
            0.0
        };

        let tnd_sum = triangle / 8227.0 + noise / 12241.0 + dmc / 22638.0;
        let tnd_out = if tnd_sum > 0.0 {
            159.79 / (1.0 / tnd_sum + 100.0)
        } else {
            0.0
        };

        pulse_out + tnd_out
    }

    /// Flush the cycles accumulated since the last flush into samples.
    pub fn end_frame(&mut self) {
        self.blip.end_frame(self.t_cpu);
        self.t_cpu = 0;
    }

    pub fn samples_available(&self) -> usize {
        self.blip.samples_avail() as usize
    }

    /// CPU cycles needed to generate `sample_count` more samples.
    pub fn clocks_needed(&self, sample_count: u32) -> u32 {
        self.blip.clocks_needed(sample_count)
    }

    /// Returns how many samples were actually written.
    pub fn read_samples_f32(&mut self, out: &mut [f32]) -> usize {
        let want = out.len();
        if self.scratch_i16.len() < want {
            self.scratch_i16.resize(want, 0);
        }

        let got = self.blip.read_samples(&mut self.scratch_i16[..want], false);
        for i in 0..got {
            out[i] = self.scratch_i16[i] as f32 / 32768.0;
        }
        got
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_produces_no_deltas() {
        let mut mixer = Mixer::new(1_789_773.0, 44_100, 4096);
        for _ in 0..10_000 {
            mixer.step(0, 0, 0, 0, 0);
        }
        mixer.end_frame();

        let mut out = vec![0.0f32; 256];
        let got = mixer.read_samples_f32(&mut out);
        assert!(got > 0);
        assert!(out[..got].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn level_change_reaches_the_output() {
        let mut mixer = Mixer::new(1_789_773.0, 44_100, 4096);
        for i in 0..10_000 {
            let p = if i > 5000 { 15 } else { 0 };
            mixer.step(p, 0, 0, 0, 0);
        }
        mixer.end_frame();

        let mut out = vec![0.0f32; 256];
        let got = mixer.read_samples_f32(&mut out);
        assert!(out[..got].iter().any(|&s| s != 0.0));
    }

    #[test]
    fn mute_flags_drop_a_channel() {
        let mut mixer = Mixer::new(1_789_773.0, 44_100, 4096);
        mixer.mute_pulse1 = true;
        assert_eq!(mixer.mix(15, 0, 0, 0, 0), 0.0);
        assert!(mixer.mix(15, 15, 0, 0, 0) > 0.0);
    }
}
