//! Catalogue assembler.
//!
//! Takes programmes and resolved molecules and builds the read-optimized
//! views the web layer lists from: one catalogue per programme and the
//! routing list (`parcours.json`).

use std::collections::BTreeMap;

use tracing::{debug, info, instrument};

use coursebuild_shared::{
    Catalogue, CatalogueModule, CatalogueSeries, ParcoursEntry, Programme, ResolvedCourse,
    ResolvedSeries,
};

/// Everything the assembler produces for one run.
#[derive(Debug, Clone, Default)]
pub struct Assembly {
    /// Programmes ordered by `(order, id)`.
    pub programmes: Vec<Programme>,
    /// One per programme, keyed by programme ID.
    pub catalogues: BTreeMap<String, Catalogue>,
    /// Same order as `programmes`.
    pub parcours: Vec<ParcoursEntry>,
}

/// Build every catalogue and the routing list.
#[instrument(skip_all, fields(programmes = programmes.len(), courses = courses.len(), series = series.len()))]
pub fn assemble(
    programmes: &[Programme],
    courses: &BTreeMap<String, ResolvedCourse>,
    series: &BTreeMap<String, ResolvedSeries>,
) -> Assembly {
    let mut ordered = programmes.to_vec();
    ordered.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));

    let catalogues: BTreeMap<String, Catalogue> = ordered
        .iter()
        .map(|p| (p.id.clone(), build_catalogue(p, courses, series)))
        .collect();

    let parcours = ordered.iter().map(|p| parcours_entry(p, courses)).collect();

    info!(catalogues = catalogues.len(), "catalogues assembled");

    Assembly {
        programmes: ordered,
        catalogues,
        parcours,
    }
}

/// Project one programme's courses and series into list entries.
///
/// Slugs that do not resolve are dropped. Modules are ordered by
/// `(order, slug)`, series by `(trimestre, priority desc, slug)`.
pub fn build_catalogue(
    programme: &Programme,
    courses: &BTreeMap<String, ResolvedCourse>,
    series: &BTreeMap<String, ResolvedSeries>,
) -> Catalogue {
    let mut modules: Vec<CatalogueModule> = programme
        .cours
        .iter()
        .filter_map(|slug| lookup(courses, slug, &programme.id))
        .map(module_entry)
        .collect();
    modules.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.slug.cmp(&b.slug)));

    let mut entries: Vec<CatalogueSeries> = programme
        .series
        .iter()
        .filter_map(|slug| lookup(series, slug, &programme.id))
        .map(series_entry)
        .collect();
    entries.sort_by(|a, b| {
        a.trimestre
            .cmp(&b.trimestre)
            .then_with(|| b.priority.cmp(&a.priority))
            .then_with(|| a.slug.cmp(&b.slug))
    });

    debug!(
        programme = %programme.id,
        modules = modules.len(),
        series = entries.len(),
        "catalogue built"
    );

    Catalogue {
        programme: programme.id.clone(),
        label: programme.label.clone(),
        modules,
        series: entries,
    }
}

/// A programme is active when at least one of its courses exists and is
/// visible.
pub fn parcours_entry(
    programme: &Programme,
    courses: &BTreeMap<String, ResolvedCourse>,
) -> ParcoursEntry {
    let active = programme
        .cours
        .iter()
        .filter_map(|slug| courses.get(slug))
        .any(|c| c.visible);

    ParcoursEntry {
        slug: programme.id.clone(),
        label: programme.label.clone(),
        level_slug: programme.level_slug.clone(),
        section_slug: programme.section_slug.clone(),
        order: programme.order,
        visible: programme.visible,
        active,
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn lookup<'a, T>(map: &'a BTreeMap<String, T>, slug: &str, programme: &str) -> Option<&'a T> {
    let found = map.get(slug);
    if found.is_none() {
        debug!(%programme, %slug, "dropping unresolved catalogue entry");
    }
    found
}

fn module_entry(course: &ResolvedCourse) -> CatalogueModule {
    CatalogueModule {
        slug: course.slug.clone(),
        title: course.title.clone(),
        trimester: course.trimester.clone(),
        order: course.order,
        total_activities: course.total_activities,
        estimated_minutes: course.estimated_minutes,
        activity_ids: course.activities().map(|a| a.id.clone()).collect(),
        visible: course.visible,
    }
}

fn series_entry(series: &ResolvedSeries) -> CatalogueSeries {
    CatalogueSeries {
        slug: series.slug.clone(),
        title: series.title.clone(),
        series_type: series.series_type,
        trimestre: series.trimestre,
        priority: series.priority,
        modules: series.modules.clone(),
        total_activities: series.total_activities,
        estimated_minutes: series.estimated_minutes,
        activity_ids: series.activities.iter().map(|a| a.id.clone()).collect(),
        visible: series.visible,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use coursebuild_shared::{AtomKind, ResolvedActivity, ResolvedSection, SeriesType};

    use super::*;

    fn activities(prefix: &str, n: usize) -> Vec<ResolvedActivity> {
        (0..n)
            .map(|i| ResolvedActivity {
                id: format!("{prefix}-{i}"),
                kind: AtomKind::Lesson,
                title: format!("{prefix} {i}"),
                time_minutes: 5,
                section_id: None,
                quiz_atom_ids: None,
            })
            .collect()
    }

    fn resolved_course(slug: &str, order: u32, n: usize, visible: bool) -> ResolvedCourse {
        let half = n / 2;
        let mut all = activities(slug, n);
        let rest = all.split_off(half);
        ResolvedCourse {
            slug: slug.into(),
            title: slug.to_uppercase(),
            description: String::new(),
            programme: "terminale".into(),
            trimester: "T1".into(),
            order,
            estimated_minutes: 60,
            objectives: vec![],
            visible,
            sections: vec![
                ResolvedSection {
                    id: "a".into(),
                    label: "A".into(),
                    activities: all,
                },
                ResolvedSection {
                    id: "b".into(),
                    label: "B".into(),
                    activities: rest,
                },
            ],
            total_activities: n,
        }
    }

    fn resolved_series(slug: &str, trimestre: u8, priority: i32, n: usize) -> ResolvedSeries {
        ResolvedSeries {
            slug: slug.into(),
            title: slug.into(),
            description: String::new(),
            difficulty: 1,
            estimated_minutes: 20,
            tags: vec![],
            series_type: SeriesType::CrossModule,
            trimestre,
            modules: vec![],
            priority,
            success_threshold: 70,
            visible: true,
            activities: activities(slug, n),
            total_activities: n,
        }
    }

    fn programme(id: &str, order: u32, cours: &[&str], series: &[&str]) -> Programme {
        Programme {
            id: id.into(),
            label: id.to_uppercase(),
            level_slug: "terminale".into(),
            section_slug: id.into(),
            order,
            color: "red".into(),
            icon: "pi".into(),
            visible: true,
            cours: cours.iter().map(|s| s.to_string()).collect(),
            series: series.iter().map(|s| s.to_string()).collect(),
            source: PathBuf::new(),
        }
    }

    fn by_slug<T: Clone>(items: &[(&str, T)]) -> BTreeMap<String, T> {
        items.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn catalogue_counts_match_resolved_molecules() {
        let courses = by_slug(&[
            ("c1", resolved_course("c1", 1, 10, true)),
            ("c2", resolved_course("c2", 2, 7, true)),
        ]);
        let p = programme("terminale", 0, &["c2", "c1"], &[]);

        let catalogue = build_catalogue(&p, &courses, &BTreeMap::new());
        assert_eq!(catalogue.modules.len(), 2);
        assert_eq!(catalogue.modules[0].slug, "c1");
        assert_eq!(catalogue.modules[0].total_activities, 10);
        assert_eq!(catalogue.modules[0].activity_ids.len(), 10);
        assert_eq!(catalogue.modules[1].total_activities, 7);
        assert_eq!(catalogue.modules[1].activity_ids[0], "c2-0");
    }

    #[test]
    fn unresolved_slugs_are_dropped() {
        let courses = by_slug(&[("c1", resolved_course("c1", 0, 2, true))]);
        let p = programme("p", 0, &["c1", "ghost"], &["nope"]);
        let catalogue = build_catalogue(&p, &courses, &BTreeMap::new());
        assert_eq!(catalogue.modules.len(), 1);
        assert!(catalogue.series.is_empty());
    }

    #[test]
    fn ordering_rules() {
        let courses = by_slug(&[
            ("b", resolved_course("b", 1, 1, true)),
            ("a", resolved_course("a", 1, 1, true)),
            ("z", resolved_course("z", 0, 1, true)),
        ]);
        let series = by_slug(&[
            ("s-low", resolved_series("s-low", 1, 0, 2)),
            ("s-high", resolved_series("s-high", 1, 5, 2)),
            ("s-t2", resolved_series("s-t2", 2, 9, 2)),
            ("s-alpha", resolved_series("s-alpha", 1, 5, 2)),
        ]);
        let p = programme("p", 0, &["b", "a", "z"], &["s-t2", "s-low", "s-high", "s-alpha"]);

        let catalogue = build_catalogue(&p, &courses, &series);
        let modules: Vec<_> = catalogue.modules.iter().map(|m| m.slug.as_str()).collect();
        assert_eq!(modules, vec!["z", "a", "b"]);
        let series: Vec<_> = catalogue.series.iter().map(|s| s.slug.as_str()).collect();
        assert_eq!(series, vec!["s-alpha", "s-high", "s-low", "s-t2"]);
    }

    #[test]
    fn parcours_active_flag() {
        let courses = by_slug(&[
            ("shown", resolved_course("shown", 0, 1, true)),
            ("hidden", resolved_course("hidden", 0, 1, false)),
        ]);
        let programmes = vec![
            programme("second", 2, &["hidden"], &[]),
            programme("first", 1, &["hidden", "shown"], &[]),
            programme("empty", 1, &["ghost"], &[]),
        ];

        let assembly = assemble(&programmes, &courses, &BTreeMap::new());
        let order: Vec<_> = assembly.parcours.iter().map(|e| e.slug.as_str()).collect();
        assert_eq!(order, vec!["empty", "first", "second"]);
        let active: Vec<_> = assembly.parcours.iter().map(|e| e.active).collect();
        assert_eq!(active, vec![false, true, false]);
        assert_eq!(assembly.catalogues.len(), 3);
    }
}
