//! Mirror stage: cached access to the upstream's project pages
//!
//! Every lookup starts in a read transaction. Pages that are unchanged
//! upstream resolve to data already in the store and never take the
//! writer lock. When something did change, the master escalates to a write
//! transaction while a replica waits for the master's write to arrive
//! through replication.

use crate::config::NodeRole;
use crate::error::{MirrorError, MirrorResult};
use crate::links::{perform_crawling, Link, LinkSet};
use crate::mirror::cache::{CacheEntry, ProjectLinks, UpdatedAt};
use crate::name::ProjectName;
use crate::resolver::{ContentResolver, Persist};
use crate::serials::SerialTable;
use crate::store::{Transaction, TransactionStore, WriteOutcome};
use crate::upstream::{HttpFetch, HttpResponse, DEVPI_SERIAL_HEADER};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use url::Url;

type TxResult<T> = MirrorResult<(Box<dyn Transaction>, T)>;

/// Stage settings derived from the configuration
#[derive(Debug, Clone)]
pub struct StageSettings {
    /// Whether this node writes to the store itself
    pub role: NodeRole,
    /// Simple index project pages are fetched from
    pub simple_url: Url,
    /// How long a fetched page is served without asking upstream again
    pub cache_expiry: Duration,
    /// Bound on waiting for replicated writes; `None` waits forever
    pub replica_wait_timeout: Option<Duration>,
}

/// Release file reference inside [`VersionData`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionLink {
    pub rel: &'static str,
    pub entrypath: String,
}

/// Metadata of one version, as far as the simple page tells
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionData {
    pub name: ProjectName,
    pub version: String,
    pub links: Vec<VersionLink>,
}

/// The mirror index of one node
pub struct MirrorStage {
    settings: StageSettings,
    http: Arc<dyn HttpFetch>,
    store: Arc<dyn TransactionStore>,
    resolver: Arc<dyn ContentResolver>,
    serials: Arc<SerialTable>,
    updated_at: UpdatedAt,
}

impl MirrorStage {
    pub fn new(
        settings: StageSettings,
        http: Arc<dyn HttpFetch>,
        store: Arc<dyn TransactionStore>,
        resolver: Arc<dyn ContentResolver>,
        serials: Arc<SerialTable>,
    ) -> Self {
        Self {
            settings,
            http,
            store,
            resolver,
            serials,
            updated_at: UpdatedAt::new(),
        }
    }

    pub fn role(&self) -> NodeRole {
        self.settings.role
    }

    pub fn simple_url(&self) -> &Url {
        &self.settings.simple_url
    }

    pub fn serials(&self) -> &SerialTable {
        &self.serials
    }

    pub fn updated_at(&self) -> &UpdatedAt {
        &self.updated_at
    }

    /// Release entries of `project`, newest first
    ///
    /// Serves the cached page while it is fresh. Otherwise the page is
    /// fetched, crawled one hop deep and persisted. A project upstream
    /// reports as missing yields [`ProjectLinks::Absent`], which is cached
    /// like any other answer.
    pub async fn get_links(&self, project: &str) -> MirrorResult<ProjectLinks> {
        let project = ProjectName::new(project);
        let tx = self.store.begin(false).await?;
        let (tx, links) = self.simple_links(tx, &project).await?;
        tx.commit()?;
        Ok(links)
    }

    /// Whether upstream knows `project`
    pub async fn has_project(&self, project: &str) -> MirrorResult<bool> {
        Ok(!self.get_links(project).await?.is_absent())
    }

    /// All projects served through the mirror, sorted
    pub fn list_projects(&self) -> Vec<ProjectName> {
        self.serials.projects()
    }

    /// Versions of `project` found on its simple page
    pub async fn list_versions(&self, project: &str) -> MirrorResult<BTreeSet<String>> {
        let links = self.get_links(project).await?;
        Ok(links
            .entries()
            .iter()
            .filter_map(|entry| entry.egg_or_version())
            .collect())
    }

    /// Release files of one version, `None` if the version is unknown
    pub async fn get_version_data(
        &self,
        project: &str,
        version: &str,
    ) -> MirrorResult<Option<VersionData>> {
        let links = self.get_links(project).await?;
        let files: Vec<VersionLink> = links
            .entries()
            .iter()
            .filter(|entry| entry.egg_or_version().as_deref() == Some(version))
            .map(|entry| VersionLink {
                rel: "releasefile",
                entrypath: entry.key.clone(),
            })
            .collect();
        if files.is_empty() {
            return Ok(None);
        }
        Ok(Some(VersionData {
            name: ProjectName::new(project),
            version: version.to_string(),
            links: files,
        }))
    }

    /// Forget the cached page of `project`
    ///
    /// The next lookup fetches it from upstream again.
    pub async fn clear_cache(&self, project: &str) -> MirrorResult<()> {
        if self.settings.role == NodeRole::Replica {
            return Err(MirrorError::ReplicaReadOnly(format!(
                "cannot clear the cache of {}",
                project
            )));
        }
        let project = ProjectName::new(project);
        let mut tx = self.store.begin(true).await?;
        CacheEntry::clear(tx.as_mut(), &project);
        tx.commit()?;
        debug!("cleared cache for {}", project);
        Ok(())
    }

    fn is_fresh(&self, project: &ProjectName, cached: &CacheEntry) -> bool {
        cached.serial >= self.serials.get(project)
            && self.updated_at.is_recent(project, self.settings.cache_expiry)
    }

    fn project_url(&self, project: &ProjectName) -> MirrorResult<Url> {
        self.settings
            .simple_url
            .join(&format!("{}/", project))
            .map_err(|e| MirrorError::invalid_url(format!("{}{}/", self.settings.simple_url, project), e))
    }

    async fn simple_links(
        &self,
        mut tx: Box<dyn Transaction>,
        project: &ProjectName,
    ) -> TxResult<ProjectLinks> {
        let cached = CacheEntry::load(tx.as_ref(), project)?;
        if let Some(cached) = &cached {
            if self.is_fresh(project, cached) {
                return Ok((tx, cached.clone().into_links()));
            }
        }
        let stale = cached.and_then(|cached| cached.entries);

        let url = self.project_url(project)?;
        debug!("reading index {}", url);
        let response = match self.http.get(&url).await {
            Ok(response) => response,
            Err(e) if e.is_upstream() => match stale {
                Some(entries) => {
                    error!("serving stale links for {}, url {} failed: {}", project, url, e);
                    return Ok((tx, ProjectLinks::Present(entries)));
                }
                None => return Err(e),
            },
            Err(e) => return Err(e),
        };

        if response.status != 200 {
            if let Some(entries) = stale {
                error!(
                    "serving stale links for {}, url {} responded {}",
                    project, url, response.status
                );
                return Ok((tx, ProjectLinks::Present(entries)));
            }
            if response.status == 404 {
                return self.persist_absent(tx, project, &response).await;
            }
            return Err(MirrorError::UpstreamStatus {
                status: response.status,
                url: url.to_string(),
            });
        }

        let serial = response.pypi_serial()?;
        self.serials.advance(project, serial)?;
        debug!("{}: got response with serial {}", project, serial);

        let returned = response
            .url
            .path()
            .trim_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default();
        if !project.matches(returned) {
            return Err(MirrorError::Upstream(format!(
                "{}: index answered with the page at {}",
                project, response.url
            )));
        }

        let mut links = LinkSet::new(project.clone());
        links.parse_index(&response.url, &response.body, true);
        perform_crawling(&mut links, self.http.as_ref()).await;
        let release_links = links.release_links();

        if let Persist::Done(links) =
            self.map_and_dump(tx.as_mut(), project, &release_links, serial)?
        {
            return Ok((tx, links));
        }

        match self.settings.role {
            NodeRole::Master => {
                let mut tx = self.store.restart_as_write(tx).await?;
                match self.map_and_dump(tx.as_mut(), project, &release_links, serial)? {
                    Persist::Done(links) => Ok((tx, links)),
                    Persist::NeedsWrite => Err(refused_write(project)),
                }
            }
            NodeRole::Replica => {
                let devpi_serial = response.devpi_serial()?.ok_or_else(|| {
                    MirrorError::MissingSerialHeader {
                        url: response.url.to_string(),
                        header: DEVPI_SERIAL_HEADER,
                    }
                })?;
                self.wait_for_master(tx, project, devpi_serial).await
            }
        }
    }

    /// Cache the non-existence of `project`
    async fn persist_absent(
        &self,
        mut tx: Box<dyn Transaction>,
        project: &ProjectName,
        response: &HttpResponse,
    ) -> TxResult<ProjectLinks> {
        let marker = CacheEntry::absent(self.serials.get(project));
        if let Persist::Done(links) = self.dump(tx.as_mut(), project, marker.clone())? {
            return Ok((tx, links));
        }

        match self.settings.role {
            NodeRole::Master => {
                let mut tx = self.store.restart_as_write(tx).await?;
                match self.dump(tx.as_mut(), project, marker)? {
                    Persist::Done(links) => Ok((tx, links)),
                    Persist::NeedsWrite => Err(refused_write(project)),
                }
            }
            NodeRole::Replica => match response.devpi_serial()? {
                Some(devpi_serial) => self.wait_for_master(tx, project, devpi_serial).await,
                None => {
                    debug!("{}: not found upstream, marker left to the master", project);
                    Ok((tx, ProjectLinks::Absent))
                }
            },
        }
    }

    /// Resolve `links` and store the page, within `tx`
    fn map_and_dump(
        &self,
        tx: &mut dyn Transaction,
        project: &ProjectName,
        links: &[Link],
        serial: i64,
    ) -> MirrorResult<Persist<ProjectLinks>> {
        let mut entries = Vec::with_capacity(links.len());
        for link in links {
            match self.resolver.resolve(tx, link)? {
                Persist::Done(entry) => entries.push(entry),
                Persist::NeedsWrite => return Ok(Persist::NeedsWrite),
            }
        }
        self.dump(tx, project, CacheEntry::present(serial, entries))
    }

    fn dump(
        &self,
        tx: &mut dyn Transaction,
        project: &ProjectName,
        entry: CacheEntry,
    ) -> MirrorResult<Persist<ProjectLinks>> {
        match entry.dump(tx, project)? {
            WriteOutcome::ReadOnlyViolation => return Ok(Persist::NeedsWrite),
            WriteOutcome::Unchanged => debug!("data unchanged for {}", project),
            WriteOutcome::Applied => debug!("saving data for {} at serial {}", project, entry.serial),
        }
        self.updated_at.touch(project);
        Ok(Persist::Done(entry.into_links()))
    }

    /// Wait until the master's write for `project` has been replicated
    async fn wait_for_master(
        &self,
        tx: Box<dyn Transaction>,
        project: &ProjectName,
        devpi_serial: u64,
    ) -> TxResult<ProjectLinks> {
        tx.commit()?;
        debug!("{}: waiting for devpi_serial {}", project, devpi_serial);
        let wait = self.store.wait_for_serial(devpi_serial);
        match self.settings.replica_wait_timeout {
            None => wait.await?,
            Some(limit) => tokio::time::timeout(limit, wait).await.map_err(|_| {
                MirrorError::ReplicaWaitTimeout {
                    project: project.to_string(),
                    serial: devpi_serial,
                }
            })??,
        }
        info!("{}: finished waiting for devpi_serial {}", project, devpi_serial);

        let tx = self.store.begin(false).await?;
        match CacheEntry::load(tx.as_ref(), project)? {
            Some(entry) => {
                self.updated_at.touch(project);
                Ok((tx, entry.into_links()))
            }
            None => Err(MirrorError::Upstream(format!(
                "no cache links from master for {}",
                project
            ))),
        }
    }
}

fn refused_write(project: &ProjectName) -> MirrorError {
    MirrorError::Store(format!(
        "write transaction refused the page of {}",
        project
    ))
}
