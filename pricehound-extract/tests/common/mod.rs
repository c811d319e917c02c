#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use pricehound_common::{
    DiagnosticCapture, FetchRequest, FetchSession, PageSource, PriceRecord, PriceStore,
    SessionFactory, SourceKind,
};
use pricehound_extract::{
    ExtractionPipeline, PipelineSettings, PriceService, ResultRecorder, SymbolResolver,
};

/// What a fake session does when asked for a given source kind.
#[derive(Clone, Debug)]
pub enum Script {
    Page(String),
    Fail(String),
    Panic,
}

pub fn page(html: &str) -> Script {
    Script::Page(html.to_string())
}

#[derive(Default, Debug)]
pub struct SessionLog {
    pub opened: usize,
    pub closed: usize,
    pub fetched: Vec<(SourceKind, String)>,
    pub ready_locators: Vec<Option<String>>,
}

#[derive(Clone)]
pub struct FakeSessions {
    scripts: HashMap<SourceKind, Script>,
    open_fails: bool,
    open_panics: bool,
    close_panics: bool,
    pub log: Arc<Mutex<SessionLog>>,
}

impl FakeSessions {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            open_fails: false,
            open_panics: false,
            close_panics: false,
            log: Arc::new(Mutex::new(SessionLog::default())),
        }
    }

    pub fn quote(mut self, script: Script) -> Self {
        self.scripts.insert(SourceKind::QuotePage, script);
        self
    }

    pub fn search(mut self, script: Script) -> Self {
        self.scripts.insert(SourceKind::SearchPage, script);
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.open_fails = true;
        self
    }

    pub fn panicking_open(mut self) -> Self {
        self.open_panics = true;
        self
    }

    pub fn panicking_close(mut self) -> Self {
        self.close_panics = true;
        self
    }

    pub fn opened(&self) -> usize {
        self.log.lock().unwrap().opened
    }

    pub fn closed(&self) -> usize {
        self.log.lock().unwrap().closed
    }

    pub fn fetched(&self) -> Vec<(SourceKind, String)> {
        self.log.lock().unwrap().fetched.clone()
    }
}

#[async_trait]
impl SessionFactory for FakeSessions {
    async fn open(&self) -> Result<Box<dyn FetchSession>> {
        if self.open_panics {
            panic!("chromedriver handshake crashed");
        }
        if self.open_fails {
            return Err(anyhow!("chromedriver not reachable"));
        }
        self.log.lock().unwrap().opened += 1;
        Ok(Box::new(FakeSession {
            scripts: self.scripts.clone(),
            close_panics: self.close_panics,
            log: self.log.clone(),
        }))
    }
}

struct FakeSession {
    scripts: HashMap<SourceKind, Script>,
    close_panics: bool,
    log: Arc<Mutex<SessionLog>>,
}

#[async_trait]
impl FetchSession for FakeSession {
    async fn fetch(&mut self, request: &FetchRequest) -> Result<PageSource> {
        {
            let mut log = self.log.lock().unwrap();
            log.fetched.push((request.kind, request.url.clone()));
            log.ready_locators.push(request.ready_locator.clone());
        }
        match self.scripts.get(&request.kind) {
            Some(Script::Page(html)) => Ok(PageSource::new(request.kind, &request.url, html)),
            Some(Script::Fail(msg)) => Err(anyhow!("{msg}")),
            Some(Script::Panic) => panic!("driver crashed"),
            None => Err(anyhow!("navigation timed out")),
        }
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>> {
        Ok(b"\x89PNG".to_vec())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.log.lock().unwrap().closed += 1;
        if self.close_panics {
            panic!("browser quit crashed");
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    pub records: Mutex<Vec<PriceRecord>>,
    fail: bool,
    panic: bool,
}

impl MemoryStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn panicking() -> Self {
        Self {
            panic: true,
            ..Self::default()
        }
    }

    pub fn saved(&self) -> Vec<PriceRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl PriceStore for MemoryStore {
    async fn save(&self, record: &PriceRecord) -> Result<()> {
        if self.panic {
            panic!("connection pool poisoned");
        }
        if self.fail {
            return Err(anyhow!("database is locked"));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingCapture {
    pub labels: Mutex<Vec<String>>,
    pub fail: bool,
    pub panic: bool,
}

impl RecordingCapture {
    pub fn labels(&self) -> Vec<String> {
        self.labels.lock().unwrap().clone()
    }
}

#[async_trait]
impl DiagnosticCapture for RecordingCapture {
    async fn capture(&self, session: &mut dyn FetchSession, label: &str) -> Result<()> {
        self.labels.lock().unwrap().push(label.to_string());
        if self.panic {
            panic!("encoder crashed");
        }
        if self.fail {
            return Err(anyhow!("disk full"));
        }
        session.screenshot().await.map(|_| ())
    }
}

pub fn resolver() -> SymbolResolver {
    SymbolResolver::new(
        [
            ("PETR4", "PETR4:BVMF"),
            ("PETR3", "PETR3:BVMF"),
            ("VALE3", "VALE3:BVMF"),
            ("ITUB4", "ITUB4:BVMF"),
            ("BBDC4", "BBDC4:BVMF"),
        ],
        "BVMF",
    )
}

pub struct Harness {
    pub sessions: FakeSessions,
    pub store: Arc<MemoryStore>,
    pub capture: Arc<RecordingCapture>,
    pub service: PriceService,
}

pub fn harness(sessions: FakeSessions) -> Harness {
    harness_with(sessions, MemoryStore::default(), RecordingCapture::default(), true)
}

pub fn harness_with(
    sessions: FakeSessions,
    store: MemoryStore,
    capture: RecordingCapture,
    persist_sentinel: bool,
) -> Harness {
    let store = Arc::new(store);
    let capture = Arc::new(capture);
    let pipeline =
        ExtractionPipeline::new(resolver(), PipelineSettings::default(), capture.clone())
            .expect("built-in strategies compile");
    let recorder = ResultRecorder::new(store.clone()).persist_sentinel(persist_sentinel);
    let service = PriceService::new(Arc::new(sessions.clone()), pipeline, recorder);
    Harness {
        sessions,
        store,
        capture,
        service,
    }
}
