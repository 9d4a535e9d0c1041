//! Reconciliation pipeline
//!
//! Replays a season of front-end changes against the live accounts in
//! five ordered passes: rename, convert, delete, add, renew. The
//! database is authoritative and is never edited here beyond passwords
//! and shells; the passes make the OS state match it.
//!
//! Every pass re-checks live state before acting, so an interrupted run
//! is recovered by running again from the start. Ordering is
//! load-bearing: renames must land before conversions and renewals so
//! the later passes observe post-rename handles, and conversions before
//! renewals because the shell check assumes the final category is in
//! place.
//!
//! A failure on one member is recorded and that member is skipped; only
//! setup failures (unreadable change log or snapshot, a listing that
//! errors) abort the run.

use std::path::Path;

use tracing::{info, warn};

use rollbook_core::member::MemberRecord;
use rollbook_core::password::generate_password;
use rollbook_core::validate::check_conversion;
use rollbook_directory::{DirectoryClient, MemberStore};

use crate::chain::DerivedChanges;
use crate::changelog::read_changelog;
use crate::error::{EngineError, EngineResult};
use crate::notify::{Notifier, RenewalMarkers};
use crate::provision::AccountProvisioner;
use crate::report::{Pass, PassReport, SyncReport};
use crate::shells::{BackupShells, ValidShells};
use crate::snapshot::SyncSnapshot;

/// Knobs for one sync run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Report what would happen without touching anything.
    pub dry_run: bool,

    /// Enable the delete pass. Destructive, so off unless asked for.
    pub delete_missing: bool,
}

/// One sync run's collaborators, wired together.
pub struct SyncPipeline<'a, C, P, N> {
    store: &'a MemberStore<C>,
    provisioner: &'a P,
    notifier: &'a N,
    shells: &'a ValidShells,
    backup_shells: &'a BackupShells,
    markers: &'a RenewalMarkers,
    options: SyncOptions,
}

impl<'a, C, P, N> SyncPipeline<'a, C, P, N>
where
    C: DirectoryClient,
    P: AccountProvisioner,
    N: Notifier,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: &'a MemberStore<C>,
        provisioner: &'a P,
        notifier: &'a N,
        shells: &'a ValidShells,
        backup_shells: &'a BackupShells,
        markers: &'a RenewalMarkers,
        options: SyncOptions,
    ) -> Self {
        Self {
            store,
            provisioner,
            notifier,
            shells,
            backup_shells,
            markers,
            options,
        }
    }

    /// Run all five passes.
    ///
    /// `confirm_delete` is consulted once per candidate when the delete
    /// pass is enabled; batch callers pass a closure returning `false`.
    pub fn run(
        &self,
        changelog_path: &Path,
        snapshot_path: &Path,
        confirm_delete: &mut dyn FnMut(&str) -> bool,
    ) -> EngineResult<SyncReport> {
        let entries = read_changelog(changelog_path)?;
        let snapshot = SyncSnapshot::load(snapshot_path)?;
        let chain = DerivedChanges::from_entries(&entries);

        let mut report = SyncReport::new(self.options.dry_run);
        info!(
            run_id = %report.run_id,
            log_entries = entries.len(),
            snapshot_entries = snapshot.len(),
            renames = chain.rename_count(),
            dry_run = self.options.dry_run,
            "sync starting"
        );

        report.record(self.rename_pass(&chain, &snapshot));
        report.record(self.convert_pass(&chain, &snapshot));
        report.record(self.delete_pass(confirm_delete)?);
        report.record(self.add_pass()?);
        report.record(self.renew_pass(&chain, &snapshot)?);

        report.finish();
        let (applied, skipped, failed) = report.totals();
        info!(run_id = %report.run_id, applied, skipped, failed, "sync finished");
        Ok(report)
    }

    // ---- pass 1: rename ------------------------------------------------

    fn rename_pass(&self, chain: &DerivedChanges, snapshot: &SyncSnapshot) -> PassReport {
        let mut pass = PassReport::new(Pass::Rename);
        for (old, new) in chain.forward() {
            if let Err(err) = self.rename_one(&old, &new, snapshot, &mut pass) {
                warn!(old = %old, new = %new, error = %err, "rename failed");
                pass.failed(&new, err.to_string());
            }
        }
        pass
    }

    fn rename_one(
        &self,
        old: &str,
        new: &str,
        snapshot: &SyncSnapshot,
        pass: &mut PassReport,
    ) -> EngineResult<()> {
        let Some(previous) = snapshot.get(old) else {
            pass.failed(new, format!("previous handle '{old}' missing from snapshot"));
            return Ok(());
        };
        let old_home = require(old, "snapshot home directory", previous.home_directory.as_deref())?;
        if !self.provisioner.home_exists(Path::new(old_home)) {
            pass.skipped(new, format!("'{old}' already renamed"));
            return Ok(());
        }

        let record = self.store.get_member(new)?;
        let new_home = require(new, "home directory", record.home_directory.as_deref())?;
        if self.options.dry_run {
            pass.applied(new, format!("would rename {old_home} -> {new_home}"));
            return Ok(());
        }
        self.provisioner
            .rename_home(Path::new(old_home), Path::new(new_home))?;
        info!(old, new, old_home, new_home, "account renamed");
        pass.applied(new, format!("renamed from '{old}', home moved to {new_home}"));
        Ok(())
    }

    // ---- pass 2: convert -----------------------------------------------

    fn convert_pass(&self, chain: &DerivedChanges, snapshot: &SyncSnapshot) -> PassReport {
        let mut pass = PassReport::new(Pass::Convert);
        for handle in chain.converted() {
            if let Err(err) = self.convert_one(handle, chain, snapshot, &mut pass) {
                warn!(handle, error = %err, "convert failed");
                pass.failed(handle, err.to_string());
            }
        }
        pass
    }

    fn convert_one(
        &self,
        handle: &str,
        chain: &DerivedChanges,
        snapshot: &SyncSnapshot,
        pass: &mut PassReport,
    ) -> EngineResult<()> {
        let origin = chain.original_handle(handle);
        let Some(previous) = snapshot.get(origin) else {
            warn!(handle, origin, "convert flagged but not in previous directory snapshot");
            pass.skipped(handle, "not in previous directory snapshot");
            return Ok(());
        };

        let record = self.store.get_member(handle)?;
        if previous.category == record.category {
            // Converted away and back again within the season.
            pass.skipped(handle, format!("still {}", record.category));
            return Ok(());
        }
        if let Err(err) = check_conversion(previous.category, record.category) {
            pass.failed(handle, err.to_string());
            return Ok(());
        }

        let new_home = require(handle, "home directory", record.home_directory.as_deref())?;
        let gid = require(handle, "gidNumber", record.gid_number)?;
        let new_home = Path::new(new_home);

        // The database holds the post-conversion home path. Compare the
        // live group at that path to decide how much is left to do.
        match self.provisioner.home_gid(new_home)? {
            Some(live) if live == gid => {
                pass.skipped(handle, format!("already {}", record.category));
            }
            Some(_) => {
                // Home is in place (a rename this run put it there) but
                // still owned by the old group.
                if self.options.dry_run {
                    pass.applied(handle, format!("would chgrp to {}", record.category));
                    return Ok(());
                }
                self.provisioner.chgrp_home(new_home, gid)?;
                info!(handle, category = %record.category, "account converted in place");
                pass.applied(handle, format!("group changed to {}", record.category));
            }
            None => {
                let old_home = previous.home_directory.as_deref().map(Path::new);
                match old_home {
                    Some(old_home) if self.provisioner.home_exists(old_home) => {
                        if self.options.dry_run {
                            pass.applied(
                                handle,
                                format!(
                                    "would move {} and chgrp to {}",
                                    old_home.display(),
                                    record.category
                                ),
                            );
                            return Ok(());
                        }
                        self.provisioner.rename_home(old_home, new_home)?;
                        self.provisioner.chgrp_home(new_home, gid)?;
                        info!(
                            handle,
                            from = %previous.category,
                            to = %record.category,
                            "account converted"
                        );
                        pass.applied(
                            handle,
                            format!("converted {} -> {}", previous.category, record.category),
                        );
                    }
                    _ => {
                        warn!(handle, "no home directory found; earlier rename not completed?");
                        pass.skipped(handle, "no home directory found");
                    }
                }
            }
        }
        Ok(())
    }

    // ---- pass 3: delete ------------------------------------------------

    fn delete_pass(&self, confirm: &mut dyn FnMut(&str) -> bool) -> EngineResult<PassReport> {
        let mut pass = PassReport::new(Pass::Delete);
        if !self.options.delete_missing {
            info!("delete pass disabled");
            return Ok(pass);
        }

        for (handle, home) in self.provisioner.list_homes()? {
            match self.store.member_exists(&handle) {
                Ok(true) => {}
                Ok(false) => {
                    if self.options.dry_run {
                        pass.applied(&handle, "would prompt for deletion");
                    } else if confirm(&handle) {
                        self.provisioner.remove_home(&home)?;
                        info!(handle = %handle, home = %home.display(), "account deleted");
                        pass.applied(&handle, "account removed");
                    } else {
                        pass.skipped(&handle, "deletion declined");
                    }
                }
                Err(err) => {
                    warn!(handle = %handle, error = %err, "could not check database entry");
                    pass.failed(&handle, err.to_string());
                }
            }
        }
        Ok(pass)
    }

    // ---- pass 4: add ---------------------------------------------------

    fn add_pass(&self) -> EngineResult<PassReport> {
        let mut pass = PassReport::new(Pass::Add);
        for record in self.store.list_newbies()? {
            if let Err(err) = self.add_one(&record, &mut pass) {
                warn!(handle = %record.handle, error = %err, "add failed");
                pass.failed(&record.handle, err.to_string());
            }
        }
        Ok(pass)
    }

    fn add_one(&self, record: &MemberRecord, pass: &mut PassReport) -> EngineResult<()> {
        let handle = record.handle.as_str();
        let home = require(handle, "home directory", record.home_directory.as_deref())?;
        if self.provisioner.home_exists(Path::new(home)) {
            pass.skipped(handle, "account already exists");
            return Ok(());
        }
        let uid = require(handle, "uidNumber", record.uid_number)?;
        let gid = require(handle, "gidNumber", record.gid_number)?;

        if self.options.dry_run {
            pass.applied(handle, "would create account and mail details");
            return Ok(());
        }

        let password = generate_password();
        self.store.set_password(handle, &password)?;
        self.provisioner.create_home(Path::new(home), uid, gid)?;
        info!(handle, category = %record.category, uid, "account created");
        pass.applied(handle, format!("{} account created", record.category));

        if let Err(err) = self.notifier.account_details(record, Some(&password)) {
            warn!(handle, error = %err, "new account notification failed");
            pass.failed(handle, format!("notification failed: {err}"));
        }
        Ok(())
    }

    // ---- pass 5: renew -------------------------------------------------

    fn renew_pass(&self, chain: &DerivedChanges, snapshot: &SyncSnapshot) -> EngineResult<PassReport> {
        let mut pass = PassReport::new(Pass::Renew);
        for record in self.store.list_paid_non_newbies()? {
            if let Err(err) = self.renew_one(&record, chain, snapshot, &mut pass) {
                warn!(handle = %record.handle, error = %err, "renew failed");
                pass.failed(&record.handle, err.to_string());
            }
        }
        Ok(pass)
    }

    fn renew_one(
        &self,
        record: &MemberRecord,
        chain: &DerivedChanges,
        snapshot: &SyncSnapshot,
        pass: &mut PassReport,
    ) -> EngineResult<()> {
        let handle = record.handle.as_str();
        let origin = chain.original_handle(handle);
        if snapshot.get(origin).is_none() {
            warn!(handle, origin, "paid non-newbie not in previous directory snapshot");
            pass.skipped(handle, "not in previous directory snapshot");
            return Ok(());
        }
        let home = require(handle, "home directory", record.home_directory.as_deref())?;
        if !self.provisioner.home_exists(Path::new(home)) {
            warn!(handle, "missing account; earlier rename or conversion not completed?");
            pass.skipped(handle, "account missing on disk");
            return Ok(());
        }

        // Expired (or otherwise invalid) shells are restored from the
        // previous generation, keyed by the pre-rename handle.
        let shell_ok = record
            .login_shell
            .as_deref()
            .is_some_and(|s| self.shells.is_valid(s));
        if !shell_ok {
            let shell = self.backup_shells.shell_for(origin);
            if self.options.dry_run {
                pass.applied(handle, format!("would reset shell to {shell}"));
            } else {
                self.store.set_shell(handle, shell)?;
                info!(handle, shell, "login shell restored");
                pass.applied(handle, format!("shell reset to {shell}"));
            }
        }

        if self.markers.is_marked(handle) {
            pass.skipped(handle, "already notified this season");
            return Ok(());
        }

        let mut password = None;
        if chain.wants_password_reset(handle) {
            if self.options.dry_run {
                pass.applied(handle, "would reset password");
            } else {
                let fresh = generate_password();
                self.store.set_password(handle, &fresh)?;
                info!(handle, "password reset for renewal");
                pass.applied(handle, "password reset");
                password = Some(fresh);
            }
        }

        if chain.renewed(handle) {
            if self.options.dry_run {
                pass.applied(handle, "would mail renewal details");
            } else if let Err(err) = self.notifier.account_details(record, password.as_deref()) {
                // Unmarked, so the next run retries the mail (with a
                // fresh password if one was wanted; this one was never
                // seen).
                warn!(handle, error = %err, "renewal notification failed");
                pass.failed(handle, format!("notification failed: {err}"));
            } else {
                pass.applied(handle, "renewal details mailed");
                self.markers.mark(handle)?;
            }
        }
        Ok(())
    }
}

/// Capture the pre-cycle snapshot and clear the season's notification
/// markers. Run once, immediately before the front-end's new database
/// generation goes live.
pub fn capture_presync<C: DirectoryClient>(
    store: &MemberStore<C>,
    snapshot_path: &Path,
    markers: &RenewalMarkers,
) -> EngineResult<SyncSnapshot> {
    let members = store.list_members()?;
    let snapshot = SyncSnapshot::capture(&members);
    snapshot.save(snapshot_path)?;
    let cleared = markers.clear_all()?;
    info!(
        entries = snapshot.len(),
        markers_cleared = cleared,
        path = %snapshot_path.display(),
        "presync snapshot written"
    );
    Ok(snapshot)
}

fn require<T>(handle: &str, field: &'static str, value: Option<T>) -> EngineResult<T> {
    value.ok_or_else(|| EngineError::MissingField {
        handle: handle.to_string(),
        field,
    })
}
