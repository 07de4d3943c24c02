use midiroute::{
    extract_channels, timeline, ChannelSummary, InstrumentDescriptor, InstrumentState, NoteRange,
    RoutingEvent, RoutingObserver, RoutingStore,
};
use std::sync::{Arc, Mutex};

/// Observer that keeps every event for later assertions.
#[derive(Default)]
pub struct RecordingObserver {
    pub events: Mutex<Vec<RoutingEvent>>,
}

impl RoutingObserver for RecordingObserver {
    fn on_event(&self, event: &RoutingEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

impl RecordingObserver {
    pub fn take(&self) -> Vec<RoutingEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

pub struct TestFixture {
    pub channels: Vec<ChannelSummary>,
    pub instruments: Vec<InstrumentDescriptor>,
    pub observer: Arc<RecordingObserver>,
}

impl TestFixture {
    /// A four-channel song (piano, bass, pad, drums) against a small rig.
    pub fn new() -> Self {
        let events = timeline::from_smf(&Self::song_bytes()).expect("fixture MIDI should parse");
        let channels = extract_channels(&events);

        Self {
            channels,
            instruments: Self::rig(),
            observer: Arc::new(RecordingObserver::default()),
        }
    }

    pub fn store(&self) -> RoutingStore {
        let mut store = RoutingStore::new(self.observer.clone());
        store.load(self.channels.clone(), self.instruments.clone());
        store
    }

    pub fn rig() -> Vec<InstrumentDescriptor> {
        vec![
            device("grand", "Yamaha CP88", "piano", Some((21, 108)), true, InstrumentState::Ready),
            device("mono", "Moog Minitaur", "bass", Some((24, 72)), true, InstrumentState::Ready),
            device("poly", "Prophet-5", "synth", Some((36, 96)), true, InstrumentState::Ready),
            device("tr8", "Roland TR-8S", "drums", None, true, InstrumentState::Ready),
        ]
    }

    /// Format 0 file: channel 0 piano chords, channel 1 bass, channel 4 pad,
    /// channel 9 drums. Note counts: drums 16, piano 12, bass 8, pad 2.
    pub fn song_bytes() -> Vec<u8> {
        let mut track = Vec::new();
        // Programs: piano 0, fingered bass 33, warm pad 89
        track.extend_from_slice(&[0x00, 0xC0, 0]);
        track.extend_from_slice(&[0x00, 0xC1, 33]);
        track.extend_from_slice(&[0x00, 0xC4, 89]);

        // Pad: two long notes
        track.extend_from_slice(&[0x00, 0x94, 60, 50]);
        track.extend_from_slice(&[0x00, 0x94, 67, 50]);

        for bar in 0..4u8 {
            // Piano triad on the downbeat
            track.extend_from_slice(&[0x00, 0x90, 48 + bar, 90]);
            track.extend_from_slice(&[0x00, 0x90, 52 + bar, 80]);
            track.extend_from_slice(&[0x00, 0x90, 55 + bar, 70]);
            // Bass twice per bar
            track.extend_from_slice(&[0x00, 0x91, 36 + bar, 100]);
            // Kick and hat, four per bar
            track.extend_from_slice(&[0x00, 0x99, 36, 120]);
            track.extend_from_slice(&[0x00, 0x99, 42, 60]);

            // 240 ticks later
            track.extend_from_slice(&[0x81, 0x70, 0x89, 36, 0]);
            track.extend_from_slice(&[0x00, 0x89, 42, 0]);
            track.extend_from_slice(&[0x00, 0x81, 36 + bar, 0]);
            track.extend_from_slice(&[0x00, 0x91, 43 + bar, 90]);
            track.extend_from_slice(&[0x00, 0x99, 38, 110]);
            track.extend_from_slice(&[0x00, 0x99, 42, 55]);

            // 240 ticks later, release everything on this bar
            track.extend_from_slice(&[0x81, 0x70, 0x89, 38, 0]);
            track.extend_from_slice(&[0x00, 0x89, 42, 0]);
            track.extend_from_slice(&[0x00, 0x81, 43 + bar, 0]);
            track.extend_from_slice(&[0x00, 0x80, 48 + bar, 0]);
            track.extend_from_slice(&[0x00, 0x80, 52 + bar, 0]);
            track.extend_from_slice(&[0x00, 0x80, 55 + bar, 0]);
        }

        track.extend_from_slice(&[0x00, 0x84, 60, 0]);
        track.extend_from_slice(&[0x00, 0x84, 67, 0]);
        track.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);

        let mut buf = Vec::new();
        buf.extend_from_slice(b"MThd");
        buf.extend_from_slice(&6u32.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&480u16.to_be_bytes());
        buf.extend_from_slice(b"MTrk");
        buf.extend_from_slice(&(track.len() as u32).to_be_bytes());
        buf.extend_from_slice(&track);
        buf
    }
}

pub fn device(
    id: &str,
    name: &str,
    kind: &str,
    range: Option<(u8, u8)>,
    supports_velocity: bool,
    state: InstrumentState,
) -> InstrumentDescriptor {
    InstrumentDescriptor {
        id: id.into(),
        name: name.to_string(),
        instrument_type: kind.to_string(),
        note_range: range.map(|(min, max)| NoteRange::new(min, max)),
        supports_velocity,
        state,
    }
}
