//! Channel normalization.
//!
//! Devices describe their sensors as a free-form list of channels. The
//! normalizer maps each channel onto one of four measurement streams, first
//! by label keywords and then by positional channel id, and decimates the
//! waveform and spectrum arrays to bounded sizes.

use serde::Serialize;
use serde_json::Value;

// ---------------------------------------------------------------------------
// Raw channel readings
// ---------------------------------------------------------------------------

/// One sensor channel exactly as reported by a device (full resolution).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChannelReading {
    /// Positional id; absent when the device sent a non-integer id.
    pub id: Option<i64>,
    pub label: String,
    pub unit: String,
    #[serde(rename = "type")]
    pub channel_type: String,
    pub value: f64,
    #[serde(skip_serializing)]
    pub waveform: Vec<f64>,
    #[serde(skip_serializing)]
    pub spectrum: Vec<f64>,
}

impl ChannelReading {
    /// Extract a reading from one entry of a heartbeat `channels` array.
    ///
    /// Returns `None` for non-object entries. `value` falls back to
    /// `current_value`, and the spectrum is read from `fft_spectrum` or the
    /// older `fft` key. Non-array waveforms are treated as empty.
    pub fn from_json(entry: &Value) -> Option<Self> {
        let obj = entry.as_object()?;
        let value = obj
            .get("value")
            .filter(|v| !v.is_null())
            .or_else(|| obj.get("current_value"))
            .and_then(number_from_json)
            .unwrap_or(0.0);
        let spectrum = obj.get("fft_spectrum").or_else(|| obj.get("fft"));

        Some(Self {
            id: obj.get("id").and_then(Value::as_i64),
            label: string_field(obj.get("label")),
            unit: string_field(obj.get("unit")),
            channel_type: string_field(obj.get("type")),
            value,
            waveform: numbers_from_json(obj.get("waveform")),
            spectrum: numbers_from_json(spectrum),
        })
    }

    /// Parse a whole `channels` array, skipping malformed entries.
    pub fn list_from_json(channels: Option<&Value>) -> Vec<Self> {
        channels
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Self::from_json).collect())
            .unwrap_or_default()
    }
}

/// Accepts JSON numbers and numeric strings.
pub fn number_from_json(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn numbers_from_json(value: Option<&Value>) -> Vec<f64> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(number_from_json).collect())
        .unwrap_or_default()
}

fn string_field(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Stream mapping
// ---------------------------------------------------------------------------

/// The four semantic measurement streams of a DC bus monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    BusPositive,
    BusNegative,
    LoadCurrent,
    Leakage,
}

/// Label keywords used to recognise channels. Matching is by substring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelKeywords {
    /// Marks a bus voltage channel.
    pub bus: Vec<String>,
    /// Within a bus label, marks the negative rail.
    pub negative: Vec<String>,
    pub leakage: Vec<String>,
    pub current: Vec<String>,
}

impl Default for ChannelKeywords {
    fn default() -> Self {
        Self {
            bus: vec!["直流".into()],
            negative: vec!["-".into(), "负".into()],
            leakage: vec!["漏".into()],
            current: vec!["负载".into(), "电流".into()],
        }
    }
}

impl ChannelKeywords {
    /// Resolve a label to a stream. Bus labels without a negative marker are
    /// the positive rail. A label that also carries a leakage keyword is
    /// never classified as load current.
    pub fn match_label(&self, label: &str) -> Option<Stream> {
        let has = |words: &[String]| words.iter().any(|w| !w.is_empty() && label.contains(w.as_str()));

        if has(&self.bus) {
            if has(&self.negative) {
                Some(Stream::BusNegative)
            } else {
                Some(Stream::BusPositive)
            }
        } else if has(&self.leakage) {
            Some(Stream::Leakage)
        } else if has(&self.current) {
            Some(Stream::LoadCurrent)
        } else {
            None
        }
    }
}

/// Positional fallback for channels whose label is not recognised.
///
/// The negative bus rail has no positional id.
pub fn stream_for_position(id: i64) -> Option<Stream> {
    match id {
        0 => Some(Stream::BusPositive),
        1 => Some(Stream::LoadCurrent),
        2 => Some(Stream::Leakage),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Normalized sample
// ---------------------------------------------------------------------------

/// Heartbeat readings mapped onto the four streams, with bounded arrays.
///
/// Serialized field names are the ones live viewers consume.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedSample {
    #[serde(rename = "voltage")]
    pub bus_pos: f64,
    #[serde(rename = "voltage_neg")]
    pub bus_neg: f64,
    pub current: f64,
    pub leakage: f64,
    #[serde(rename = "voltage_waveform")]
    pub bus_pos_waveform: Vec<f64>,
    #[serde(rename = "voltage_spectrum")]
    pub bus_pos_spectrum: Vec<f64>,
    #[serde(rename = "voltage_neg_waveform")]
    pub bus_neg_waveform: Vec<f64>,
    #[serde(rename = "voltage_neg_spectrum")]
    pub bus_neg_spectrum: Vec<f64>,
    pub current_waveform: Vec<f64>,
    pub current_spectrum: Vec<f64>,
    pub leakage_waveform: Vec<f64>,
    pub leakage_spectrum: Vec<f64>,
}

/// Scalar values only, for the lightweight status channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SampleMetrics {
    pub voltage: f64,
    pub voltage_neg: f64,
    pub current: f64,
    pub leakage: f64,
}

impl NormalizedSample {
    fn assign(&mut self, stream: Stream, value: f64, waveform: Vec<f64>, spectrum: Vec<f64>) {
        let (v, w, s) = match stream {
            Stream::BusPositive => (
                &mut self.bus_pos,
                &mut self.bus_pos_waveform,
                &mut self.bus_pos_spectrum,
            ),
            Stream::BusNegative => (
                &mut self.bus_neg,
                &mut self.bus_neg_waveform,
                &mut self.bus_neg_spectrum,
            ),
            Stream::LoadCurrent => (
                &mut self.current,
                &mut self.current_waveform,
                &mut self.current_spectrum,
            ),
            Stream::Leakage => (
                &mut self.leakage,
                &mut self.leakage_waveform,
                &mut self.leakage_spectrum,
            ),
        };
        *v = value;
        *w = waveform;
        *s = spectrum;
    }

    pub fn metrics(&self) -> SampleMetrics {
        SampleMetrics {
            voltage: self.bus_pos,
            voltage_neg: self.bus_neg,
            current: self.current,
            leakage: self.leakage,
        }
    }
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// Maps raw channel lists onto [`NormalizedSample`]s.
#[derive(Debug, Clone)]
pub struct ChannelNormalizer {
    keywords: ChannelKeywords,
    waveform_cap: usize,
    spectrum_cap: usize,
}

impl ChannelNormalizer {
    /// A cap of `0` disables decimation for that array kind.
    pub fn new(keywords: ChannelKeywords, waveform_cap: usize, spectrum_cap: usize) -> Self {
        Self {
            keywords,
            waveform_cap,
            spectrum_cap,
        }
    }

    /// Build a sample from raw channels. When two channels resolve to the
    /// same stream the later one wins. Channels that match neither a label
    /// keyword nor a positional id are ignored.
    pub fn normalize(&self, channels: &[ChannelReading]) -> NormalizedSample {
        let mut sample = NormalizedSample::default();
        for channel in channels {
            let stream = self
                .keywords
                .match_label(&channel.label)
                .or_else(|| channel.id.and_then(stream_for_position));
            if let Some(stream) = stream {
                sample.assign(
                    stream,
                    channel.value,
                    downsample(channel.waveform.clone(), self.waveform_cap),
                    downsample(channel.spectrum.clone(), self.spectrum_cap),
                );
            }
        }
        sample
    }
}

/// Fixed-stride decimation.
///
/// Arrays at or below `cap` (or any array when `cap == 0`) are returned
/// unchanged. Otherwise every `len / cap`-th element is kept, then the result
/// is truncated to exactly `cap` points.
pub fn downsample(values: Vec<f64>, cap: usize) -> Vec<f64> {
    if cap == 0 || values.len() <= cap {
        return values;
    }
    let step = (values.len() / cap).max(1);
    values.into_iter().step_by(step).take(cap).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reading(id: i64, label: &str, value: f64) -> ChannelReading {
        ChannelReading {
            id: Some(id),
            label: label.to_string(),
            value,
            waveform: vec![value; 4],
            ..Default::default()
        }
    }

    fn normalizer() -> ChannelNormalizer {
        ChannelNormalizer::new(ChannelKeywords::default(), 256, 128)
    }

    // -- downsample -----------------------------------------------------------

    #[test]
    fn downsample_keeps_short_arrays() {
        let a = vec![1.0, 2.0, 3.0];
        assert_eq!(downsample(a.clone(), 3), a);
        assert_eq!(downsample(a.clone(), 10), a);
    }

    #[test]
    fn downsample_zero_cap_is_identity() {
        let a: Vec<f64> = (0..1000).map(f64::from).collect();
        assert_eq!(downsample(a.clone(), 0), a);
    }

    #[test]
    fn downsample_hits_cap_exactly() {
        for (len, cap) in [(1024, 256), (1000, 256), (300, 256), (115, 100), (7, 3)] {
            let a: Vec<f64> = (0..len).map(f64::from).collect();
            assert_eq!(downsample(a, cap).len(), cap, "len={len} cap={cap}");
        }
    }

    #[test]
    fn downsample_uses_fixed_stride() {
        let a: Vec<f64> = (0..10).map(f64::from).collect();
        assert_eq!(downsample(a, 3), vec![0.0, 3.0, 6.0]);
    }

    // -- label matching -------------------------------------------------------

    #[test]
    fn bus_labels_split_on_negative_marker() {
        let kw = ChannelKeywords::default();
        assert_eq!(kw.match_label("直流母线(+)"), Some(Stream::BusPositive));
        assert_eq!(kw.match_label("直流母线"), Some(Stream::BusPositive));
        assert_eq!(kw.match_label("直流母线(-)"), Some(Stream::BusNegative));
        assert_eq!(kw.match_label("直流负母线"), Some(Stream::BusNegative));
    }

    #[test]
    fn leakage_wins_over_current() {
        let kw = ChannelKeywords::default();
        assert_eq!(kw.match_label("漏电流"), Some(Stream::Leakage));
        assert_eq!(kw.match_label("负载电流"), Some(Stream::LoadCurrent));
        assert_eq!(kw.match_label("temperature"), None);
    }

    #[test]
    fn custom_keywords_replace_defaults() {
        let kw = ChannelKeywords {
            bus: vec!["DC".into()],
            negative: vec!["neg".into()],
            leakage: vec!["leak".into()],
            current: vec!["load".into()],
        };
        assert_eq!(kw.match_label("DC neg"), Some(Stream::BusNegative));
        assert_eq!(kw.match_label("load"), Some(Stream::LoadCurrent));
        assert_eq!(kw.match_label("直流"), None);
    }

    // -- normalize ------------------------------------------------------------

    #[test]
    fn normalize_by_label() {
        let sample = normalizer().normalize(&[
            reading(9, "直流母线(+)", 375.0),
            reading(9, "直流母线(-)", -375.0),
            reading(9, "负载电流", 12.5),
            reading(9, "漏电流", 0.3),
        ]);
        assert_eq!(sample.bus_pos, 375.0);
        assert_eq!(sample.bus_neg, -375.0);
        assert_eq!(sample.current, 12.5);
        assert_eq!(sample.leakage, 0.3);
        assert_eq!(sample.leakage_waveform, vec![0.3; 4]);
    }

    #[test]
    fn normalize_falls_back_to_position() {
        let sample = normalizer().normalize(&[
            reading(0, "ch0", 400.0),
            reading(1, "ch1", 10.0),
            reading(2, "ch2", 0.5),
            reading(3, "ch3", -400.0),
        ]);
        assert_eq!(sample.bus_pos, 400.0);
        assert_eq!(sample.current, 10.0);
        assert_eq!(sample.leakage, 0.5);
        // Position 3 has no stream: the negative rail needs a label.
        assert_eq!(sample.bus_neg, 0.0);
    }

    #[test]
    fn normalize_decimates_arrays() {
        let mut ch = reading(0, "直流母线", 1.0);
        ch.waveform = vec![1.0; 1024];
        ch.spectrum = vec![2.0; 512];
        let sample = ChannelNormalizer::new(ChannelKeywords::default(), 256, 128).normalize(&[ch]);
        assert_eq!(sample.bus_pos_waveform.len(), 256);
        assert_eq!(sample.bus_pos_spectrum.len(), 128);
    }

    #[test]
    fn serializes_with_viewer_field_names() {
        let sample = normalizer().normalize(&[reading(0, "x", 1.0)]);
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["voltage"], 1.0);
        assert!(json["voltage_neg_waveform"].is_array());
    }

    // -- JSON parsing ---------------------------------------------------------

    #[test]
    fn reading_accepts_legacy_field_names() {
        let ch = ChannelReading::from_json(&json!({
            "id": 1,
            "label": " 负载电流 ",
            "current_value": "12.5",
            "waveform": [1, 2, "x", 3],
            "fft": [0.5]
        }))
        .unwrap();
        assert_eq!(ch.id, Some(1));
        assert_eq!(ch.label, "负载电流");
        assert_eq!(ch.value, 12.5);
        assert_eq!(ch.waveform, vec![1.0, 2.0, 3.0]);
        assert_eq!(ch.spectrum, vec![0.5]);
    }

    #[test]
    fn reading_list_skips_non_objects() {
        let channels = json!([{"id": 0, "value": 1.0}, 5, "bad", null]);
        let list = ChannelReading::list_from_json(Some(&channels));
        assert_eq!(list.len(), 1);
        assert!(ChannelReading::list_from_json(Some(&json!("nope"))).is_empty());
        assert!(ChannelReading::list_from_json(None).is_empty());
    }
}
