#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use voicenav_lib::config::{CommandsConfig, ResolverConfig};
use voicenav_lib::errors::{VoiceNavError, VoiceNavResult};
use voicenav_lib::perception::types::CandidateElement;
use voicenav_lib::resolver::inference::Inference;
use voicenav_lib::resolver::types::ResolvedCommand;
use voicenav_lib::resolver::CommandResolver;

pub enum Reply {
    Command(ResolvedCommand),
    Malformed,
    Empty,
    Transport,
    /// Sleeps this long, then answers with a command.
    Slow(Duration),
}

/// Scripted inference backend: replies are consumed in order, the last one repeats.
pub struct FakeInference {
    replies: Mutex<VecDeque<Reply>>,
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<(String, usize)>>,
}

impl FakeInference {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next(&self) -> Reply {
        let mut replies = self.replies.lock().unwrap();
        if replies.len() > 1 {
            return replies.pop_front().unwrap();
        }
        match replies.front() {
            Some(Reply::Command(c)) => Reply::Command(c.clone()),
            Some(Reply::Malformed) => Reply::Malformed,
            Some(Reply::Empty) | None => Reply::Empty,
            Some(Reply::Transport) => Reply::Transport,
            Some(Reply::Slow(d)) => Reply::Slow(*d),
        }
    }
}

#[async_trait]
impl Inference for FakeInference {
    fn name(&self) -> &str {
        "fake"
    }

    async fn infer(
        &self,
        command: &str,
        elements: &[CandidateElement],
    ) -> VoiceNavResult<Option<ResolvedCommand>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((command.to_string(), elements.len()));
        match self.next() {
            Reply::Command(c) => Ok(Some(c)),
            Reply::Malformed => Err(VoiceNavError::Parse("no JSON object in reply".into())),
            Reply::Empty => Ok(None),
            Reply::Transport => Err(VoiceNavError::Transport("connection refused".into())),
            Reply::Slow(d) => {
                tokio::time::sleep(d).await;
                Ok(Some(ResolvedCommand::failed("demasiado tarde")))
            }
        }
    }
}

pub fn resolver_with(inference: Arc<FakeInference>) -> CommandResolver {
    CommandResolver::from_config(
        &ResolverConfig::default(),
        &CommandsConfig::default(),
        inference,
    )
}

pub const SITE: &str = r##"<!doctype html>
<html>
  <head><title>MiSaludDigital</title></head>
  <body>
    <header>
      <nav>
        <a href="#inicio">Inicio</a>
        <a href="#servicios">Servicios</a>
        <a href="#contacto">Contacto</a>
      </nav>
      <button id="toggle-voz" aria-label="Activar voz">Voz</button>
    </header>
    <section id="inicio"><h1>Bienvenido</h1></section>
    <section id="servicios">
      <a href="/turnos" class="card servicio">Turnos</a>
      <a href="/farmacias" class="card servicio">Farmacias</a>
    </section>
    <section id="contacto">
      <div id="contacto-telefono"><a href="tel:+541100000000">Teléfono</a></div>
      <div id="contacto-email"><a href="mailto:info@misalud.example">Email</a></div>
      <input id="buscar" type="search" aria-label="Buscar">
    </section>
  </body>
</html>
"##;
