//! MPEG audio duration by packet walk.
//!
//! The stream is demuxed with symphonia and the duration of every packet is
//! summed; nothing is decoded to PCM. A leading ID3v2 tag and stray bytes
//! between frames are skipped by the demuxer. The walk ends at the first
//! error (truncated frame, end of stream).

use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Sums packet durations of the default track in `source`.
///
/// Never fails: a stream that cannot be opened as MPEG audio yields 0.0 and
/// a broken one yields the total up to the break.
pub fn frame_duration<S: MediaSource + 'static>(source: S) -> f64 {
    let mss = MediaSourceStream::new(Box::new(source), Default::default());
    let mut hint = Hint::new();
    hint.with_extension("mp3");
    let opened = match symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    ) {
        Ok(opened) => opened,
        Err(_) => return 0.0,
    };

    let mut format = opened.format;
    let (track_id, time_base, sample_rate) = match format.default_track() {
        Some(track) => (
            track.id,
            track.codec_params.time_base,
            track.codec_params.sample_rate,
        ),
        None => return 0.0,
    };

    let mut ticks = 0u64;
    while let Ok(packet) = format.next_packet() {
        if packet.track_id() == track_id {
            ticks = ticks.saturating_add(packet.dur);
        }
    }

    match (time_base, sample_rate) {
        (Some(time_base), _) => {
            let time = time_base.calc_time(ticks);
            time.seconds as f64 + time.frac
        }
        (None, Some(rate)) if rate > 0 => ticks as f64 / f64::from(rate),
        _ => 0.0,
    }
}
